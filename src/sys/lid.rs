//! Laptop lid state from ACPI.

use std::fs;
use std::path::Path;

use tracing::trace;

pub const ACPI_LID_ROOT: &str = "/proc/acpi/button/lid";

/// `None` when the machine has no lid.
pub fn lid_closed() -> Option<bool> { read_lid_state(Path::new(ACPI_LID_ROOT)) }

/// Reads the first `*/state` file under `root`; closed if it says so.
pub fn read_lid_state(root: &Path) -> Option<bool> {
    let mut entries: Vec<_> = fs::read_dir(root).ok()?.filter_map(Result::ok).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path().join("state");
        let Ok(contents) = fs::read_to_string(&path) else {
            continue;
        };
        trace!(path = %path.display(), state = contents.trim(), "lid");
        return Some(parse_state(&contents));
    }

    None
}

fn parse_state(contents: &str) -> bool {
    contents
        .split_once(':')
        .map_or(contents, |(_, value)| value)
        .trim()
        .eq_ignore_ascii_case("closed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lid_dir(state: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("LID0")).unwrap();
        fs::write(dir.path().join("LID0/state"), state).unwrap();
        dir
    }

    #[test]
    fn reads_open_and_closed() {
        assert_eq!(read_lid_state(lid_dir("state:      open\n").path()), Some(false));
        assert_eq!(read_lid_state(lid_dir("state:      closed\n").path()), Some(true));
    }

    #[test]
    fn missing_lid_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_lid_state(dir.path()), None);
        assert_eq!(read_lid_state(&dir.path().join("absent")), None);
    }
}
