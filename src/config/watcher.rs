//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself so that
//! editors which save by writing a temp file and renaming it over the
//! original keep triggering reloads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Keeps the underlying notify watcher alive. Dropping it stops reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    _inner: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Watch `path` and send every successfully reparsed config down the
    /// returned channel. Invalid files are logged and skipped.
    pub fn watch(
        path: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<GatewayConfig>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let target = path.to_path_buf();
        let file_name = target.file_name().map(|name| name.to_os_string());

        let handler_target = target.clone();
        let mut inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Config watch error");
                        return;
                    }
                };
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                let touches_config = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if !touches_config {
                    return;
                }

                reload(&handler_target, &tx);
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        inner.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %target.display(), "Watching config file");

        Ok((
            Self {
                path: target,
                _inner: inner,
            },
            rx,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<GatewayConfig>) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(
                path = %path.display(),
                endpoints = config.endpoints.len(),
                "Config file changed, reloaded"
            );
            if tx.send(config).is_err() {
                tracing::debug!("Reload receiver dropped");
            }
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Rejected config change, keeping current one");
        }
    }
}
