use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub category: String,
    pub priority: i64,
    pub color: String,
    /// Comma-joined in storage; documents carry a list.
    pub tags: String,
    /// Reserved duration-calibration multiplier; stored, not yet consumed.
    pub reality_factor: f64,
}

impl ProjectRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            category: "General".to_string(),
            priority: 1,
            color: "#FFFFFF".to_string(),
            tags: String::new(),
            reality_factor: 1.0,
        }
    }
}
