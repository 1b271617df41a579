/// A row in the external calendar's `CalendarEvent` table. Timestamps are
/// UTC Zulu ISO strings with the local offset pre-applied (see TimeUtil).
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: String,
    pub feed_id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub all_day: bool,
    pub created_at: String,
    pub updated_at: String,
}
