use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
#[cfg(test)]
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::{Compositor, ConfigurationRequest, Event, Reactor, ReactorError};
use crate::common::config::Config;

/// Writes every reactor event to a file as RON lines, preceded by the config.
pub struct Record {
    file: Option<File>,
    #[cfg(test)]
    temp: Option<NamedTempFile>,
}

impl Record {
    pub fn new(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => Some(
                File::create(path)
                    .with_context(|| format!("Could not create {}", path.display()))?,
            ),
            None => None,
        };
        Ok(Self {
            file,
            #[cfg(test)]
            temp: None,
        })
    }

    pub fn disabled() -> Self {
        Self {
            file: None,
            #[cfg(test)]
            temp: None,
        }
    }

    #[cfg(test)]
    pub fn new_for_test() -> Self {
        Self {
            file: None,
            temp: NamedTempFile::new().ok(),
        }
    }

    #[cfg(test)]
    pub(super) fn temp_path(&self) -> Option<&Path> { self.temp.as_ref().map(|t| t.path()) }

    fn file(&mut self) -> Option<&mut File> {
        #[cfg(test)]
        return self.file.as_mut().or(self.temp.as_mut().map(|temp| temp.as_file_mut()));
        #[cfg(not(test))]
        self.file.as_mut()
    }

    pub(super) fn start(&mut self, config: &Config) {
        let Some(file) = self.file() else { return };
        let result = ron::ser::to_string(config)
            .map_err(anyhow::Error::from)
            .and_then(|line| Ok(writeln!(file, "{line}")?));
        if let Err(e) = result {
            warn!("Recording stopped: {e}");
            self.stop();
        }
    }

    pub(super) fn on_event(&mut self, event: &Event) {
        let Some(file) = self.file() else { return };
        let result = ron::ser::to_string(event)
            .map_err(anyhow::Error::from)
            .and_then(|line| Ok(writeln!(file, "{line}")?));
        if let Err(e) = result {
            warn!("Recording stopped: {e}");
            self.stop();
        }
    }

    fn stop(&mut self) {
        self.file = None;
        #[cfg(test)]
        {
            self.temp = None;
        }
    }
}

/// Logs configurations instead of sending them; replayed transactions never resolve
/// unless the recording contains their outcome.
#[derive(Default)]
pub struct LoggingCompositor {
    pub applied: usize,
}

impl Compositor for LoggingCompositor {
    fn apply(&mut self, request: &ConfigurationRequest) -> Result<(), ReactorError> {
        self.applied += 1;
        info!(serial = request.serial, heads = ?request.heads, "would apply");
        Ok(())
    }
}

/// Feeds a recording back through a fresh reactor, running a layout pass after each event.
pub fn replay(path: &Path, compositor: &mut impl Compositor) -> anyhow::Result<Reactor> {
    let file = BufReader::new(
        File::open(path).with_context(|| format!("Could not open {}", path.display()))?,
    );
    let mut lines = file.lines();
    let config: Config = match lines.next() {
        Some(line) => ron::de::from_str(&line?).context("Malformed config line")?,
        None => anyhow::bail!("Empty recording"),
    };

    let mut reactor = Reactor::new(config, PathBuf::new(), Record::disabled());
    for (number, line) in lines.enumerate() {
        let line = line?;
        let event: Event = ron::de::from_str(&line)
            .with_context(|| format!("Malformed event on line {}", number + 2))?;
        reactor.handle_event(event)?;
        reactor.layout(compositor)?;
    }

    Ok(reactor)
}
