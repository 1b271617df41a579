use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{info, warn};

use crate::error::AppResult;

/// Grace interval after a create event so partial writes settle before the
/// pipeline reads the file.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Watches the inputs directory and fires a pipeline trigger when a new
/// `.json` document lands. Modify/delete events are ignored; the next
/// manual trigger re-reads the directory anyway.
pub struct InputsWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::Receiver<notify::Result<Event>>,
    watch_dir: PathBuf,
}

impl InputsWatcher {
    pub fn new(watch_dir: PathBuf) -> AppResult<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(tx, notify::Config::default())?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
        info!(target: "app::watcher", dir = %watch_dir.display(), "watcher active");

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            watch_dir,
        })
    }

    /// Blocking loop; run it on a dedicated thread.
    pub fn watch(self, trigger_tx: tokio_mpsc::Sender<String>) {
        while let Ok(event) = self.receiver.recv() {
            match event {
                Ok(event) if is_json_create(&event) => {
                    info!(
                        target: "app::watcher",
                        dir = %self.watch_dir.display(),
                        paths = ?event.paths,
                        "new input file detected"
                    );
                    std::thread::sleep(SETTLE_DELAY);
                    // Coalesce the burst a multi-file drop produces.
                    while self.receiver.try_recv().is_ok() {}

                    if trigger_tx.try_send("auto-watcher".to_string()).is_err() {
                        warn!(target: "app::watcher", "pipeline busy, watcher trigger dropped");
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "app::watcher", error = %err, "watch error");
                }
            }
        }
    }
}

fn is_json_create(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_))
        && event.paths.iter().any(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == "json")
                .unwrap_or(false)
        })
}
