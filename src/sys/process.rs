//! Single instance per virtual terminal, enforced with `flock`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};

/// Holds the lock until dropped.
#[derive(Debug)]
pub struct PidFile {
    _lock: Flock<File>,
    path: PathBuf,
}

impl PidFile {
    pub fn path(&self) -> &Path { &self.path }
}

pub fn pid_file_path(vtnr: Option<&str>) -> PathBuf {
    match vtnr {
        Some(vt) if !vt.is_empty() => PathBuf::from(format!("/tmp/way-layout.{vt}.pid")),
        _ => PathBuf::from("/tmp/way-layout.pid"),
    }
}

/// Takes the lock for this terminal; `None` when another instance holds it.
pub fn acquire_singleton() -> anyhow::Result<Option<PidFile>> {
    let vtnr = std::env::var("XDG_VTNR").ok();
    acquire(&pid_file_path(vtnr.as_deref()))
}

pub fn acquire(path: &Path) -> anyhow::Result<Option<PidFile>> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .with_context(|| format!("Could not open {}", path.display()))?;

    let mut lock = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(lock) => lock,
        Err((_, Errno::EWOULDBLOCK)) => return Ok(None),
        Err((_, errno)) => {
            return Err(errno).with_context(|| format!("Could not lock {}", path.display()));
        }
    };

    lock.set_len(0)?;
    writeln!(lock, "{}", std::process::id())?;

    Ok(Some(PidFile { _lock: lock, path: path.to_path_buf() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_instance_is_refused_until_first_exits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("way-layout.pid");

        let first = acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(acquire(&path).unwrap().is_none());

        let pid = std::fs::read_to_string(&path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());

        drop(first);
        assert!(acquire(&path).unwrap().is_some());
    }

    #[test]
    fn path_is_per_terminal() {
        assert_eq!(pid_file_path(Some("2")), PathBuf::from("/tmp/way-layout.2.pid"));
        assert_eq!(pid_file_path(None), PathBuf::from("/tmp/way-layout.pid"));
    }
}
