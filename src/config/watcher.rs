//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself: editors that
//! save by writing a temporary file and renaming it over the original would
//! otherwise detach a file-level watch after the first save.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RelayConfig;

/// Reloads the relay configuration whenever its file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RelayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver of freshly loaded, validated configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RelayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(OsString::from);
        let path = self.path.clone();
        let tx = self.update_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, file_name.as_deref()) => reload(&path, &tx),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Whether `event` is a content change to the watched file.
fn touches(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    let relevant_kind = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    relevant_kind && event.paths.iter().any(|p| p.file_name() == file_name)
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<RelayConfig>) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Config file changed, reloading");
            let _ = tx.send(config);
        }
        Err(e) => tracing::error!(
            path = %path.display(),
            error = %e,
            "Rejected config change, keeping current configuration"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn only_changes_to_the_watched_file_count() {
        let name = Some(std::ffi::OsStr::new("relay.toml"));
        let event = |kind, path: &str| Event::new(kind).add_path(PathBuf::from(path));

        assert!(touches(&event(EventKind::Modify(ModifyKind::Any), "/etc/relay/relay.toml"), name));
        assert!(touches(&event(EventKind::Create(CreateKind::File), "/etc/relay/relay.toml"), name));
        assert!(!touches(&event(EventKind::Modify(ModifyKind::Any), "/etc/relay/other.toml"), name));
        assert!(!touches(&event(EventKind::Remove(RemoveKind::File), "/etc/relay/relay.toml"), name));
    }

    #[tokio::test]
    async fn edited_file_is_delivered_as_new_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "[relay]\npath = \"/proxy\"\n").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _guard = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&path, "[relay]\npath = \"/hls\"\nerror_page_threshold = 512\n").unwrap();

        // A truncate-then-write save can surface intermediate states first.
        let config = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let config = updates.recv().await.expect("watcher channel closed");
                if config.relay.path == "/hls" {
                    break config;
                }
            }
        })
        .await
        .expect("no reload delivered");
        assert_eq!(config.relay.error_page_threshold, 512);
    }

    #[tokio::test]
    async fn invalid_edit_is_not_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _guard = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(&path, "[relay]\npath = \"no-leading-slash\"\n").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        while let Ok(config) = updates.try_recv() {
            assert_ne!(config.relay.path, "no-leading-slash");
        }
    }
}
