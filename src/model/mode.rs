use serde::{Deserialize, Serialize};

/// Compositor-assigned handle of a `zwlr_output_mode_v1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModeId(u32);

impl ModeId {
    pub fn new(id: u32) -> Self { Self(id) }

    pub fn as_u32(self) -> u32 { self.0 }
}

/// One resolution and refresh combination offered by a head.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    pub id: ModeId,
    pub width: i32,
    pub height: i32,
    pub refresh_mhz: i32,
    pub preferred: bool,
}

impl Mode {
    pub fn new(id: ModeId) -> Self {
        Self {
            id,
            width: 0,
            height: 0,
            refresh_mhz: 0,
            preferred: false,
        }
    }

    pub fn area(&self) -> i64 { self.width as i64 * self.height as i64 }

    pub fn refresh_hz(&self) -> i32 { (self.refresh_mhz + 500) / 1000 }

    pub fn same_resolution(&self, other: &Mode) -> bool {
        self.width == other.width && self.height == other.height
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@{}Hz", self.width, self.height, self.refresh_hz())?;
        if self.preferred {
            f.write_str(" (preferred)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(width: i32, height: i32, refresh_mhz: i32) -> Mode {
        Mode {
            width,
            height,
            refresh_mhz,
            ..Mode::new(ModeId::new(1))
        }
    }

    #[test]
    fn refresh_rounds_to_nearest_hz() {
        assert_eq!(mode(1920, 1080, 59_940).refresh_hz(), 60);
        assert_eq!(mode(1920, 1080, 59_499).refresh_hz(), 59);
        assert_eq!(mode(1920, 1080, 143_981).refresh_hz(), 144);
    }

    #[test]
    fn area_does_not_overflow() {
        assert_eq!(mode(65_536, 65_536, 0).area(), 4_294_967_296);
    }

    #[test]
    fn display_marks_preferred() {
        let mut m = mode(2560, 1440, 165_000);
        assert_eq!(m.to_string(), "2560x1440@165Hz");
        m.preferred = true;
        assert_eq!(m.to_string(), "2560x1440@165Hz (preferred)");
    }
}
