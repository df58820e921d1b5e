use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{
    DebounceEventResult, DebouncedEvent, DebouncedEventKind, new_debouncer,
};
use tracing::{debug, info, trace, warn};

use crate::actor::reactor::{self, Event};
use crate::common::collections::HashSet;
use crate::common::config::Config;

/// Reloads the configuration file when it changes on disk.
pub struct ConfigWatcher {
    file: PathBuf,
    real_file: Option<PathBuf>,
    real_file_id: Option<(u64, u64)>,
    events_tx: reactor::Sender,
}

impl ConfigWatcher {
    pub fn new(config_path: PathBuf, events_tx: reactor::Sender) -> Self {
        let real_file = fs::canonicalize(&config_path).ok();
        let real_file_id = real_file
            .as_ref()
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| (m.dev(), m.ino()));

        ConfigWatcher {
            file: config_path,
            real_file,
            real_file_id,
            events_tx,
        }
    }

    /// Spawns the watcher on the current `LocalSet`.
    pub fn spawn(config_path: PathBuf, events_tx: reactor::Sender) {
        let actor = ConfigWatcher::new(config_path, events_tx);
        tokio::task::spawn_local(async move {
            if let Err(e) = actor.run().await {
                warn!("config-watcher: error: {e:?}");
            }
        });
    }

    async fn run(self) -> notify::Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<DebouncedEvent>();

        let mut debouncer =
            new_debouncer(Duration::from_millis(250), move |res: DebounceEventResult| {
                if let Ok(events) = res {
                    for e in events {
                        if e.kind == DebouncedEventKind::Any {
                            _ = tx.send(e);
                        }
                    }
                }
            })?;

        let watcher = debouncer.watcher();

        // The directory may not exist until the first write.
        let mut parents: HashSet<PathBuf> = HashSet::default();
        if let Some(p) = self.file.parent() {
            parents.insert(p.to_path_buf());
        }
        if let Some(real) = &self.real_file
            && let Some(p) = real.parent()
        {
            parents.insert(p.to_path_buf());
        }

        for dir in parents.iter() {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!("could not create {:?}: {e}", dir);
                continue;
            }
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            info!("watching {:?}", dir);
        }

        while let Some(event) = rx.recv().await {
            if !self.is_relevant(&event.path) {
                continue;
            }
            trace!("change detected (debounced): {:?} {:?}", event.kind, event.path);
            self.reload();
        }

        Ok(())
    }

    fn reload(&self) {
        if !self.file.exists() {
            debug!("{} removed, keeping the current configuration", self.file.display());
            return;
        }

        match Config::read(&self.file) {
            Ok(config) => self.events_tx.send(Event::ConfigChanged(config)),
            Err(e) => warn!("Failed to reload {}: {e:#}", self.file.display()),
        }
    }

    fn is_relevant(&self, path: &Path) -> bool {
        if path == self.file {
            return true;
        }

        if let Some(real) = &self.real_file {
            if path == real.as_path() {
                return true;
            }

            if let Ok(ev_real) = fs::canonicalize(path)
                && ev_real == *real
            {
                return true;
            }

            if let Ok(meta) = fs::metadata(path)
                && let Some((dev, ino)) = self.real_file_id
                && meta.dev() == dev
                && meta.ino() == ino
            {
                return true;
            }
        }

        path.file_name().is_some_and(|n| Some(n) == self.file.file_name())
    }
}
