use bitflags::bitflags;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::mode::{Mode, ModeId};
use crate::common::collections::HashSet;

/// Compositor-assigned handle of a `zwlr_output_head_v1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeadId(u32);

impl HeadId {
    pub fn new(id: u32) -> Self { Self(id) }

    pub fn as_u32(self) -> u32 { self.0 }
}

#[derive(
    Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default, strum::Display,
    strum::EnumString, clap::ValueEnum,
)]
pub enum Transform {
    #[default]
    #[serde(rename = "normal")]
    #[strum(serialize = "normal")]
    #[value(name = "normal")]
    Normal,
    #[serde(rename = "90")]
    #[strum(serialize = "90")]
    #[value(name = "90")]
    Rotate90,
    #[serde(rename = "180")]
    #[strum(serialize = "180")]
    #[value(name = "180")]
    Rotate180,
    #[serde(rename = "270")]
    #[strum(serialize = "270")]
    #[value(name = "270")]
    Rotate270,
    #[serde(rename = "flipped")]
    #[strum(serialize = "flipped")]
    #[value(name = "flipped")]
    Flipped,
    #[serde(rename = "flipped-90")]
    #[strum(serialize = "flipped-90")]
    #[value(name = "flipped-90")]
    Flipped90,
    #[serde(rename = "flipped-180")]
    #[strum(serialize = "flipped-180")]
    #[value(name = "flipped-180")]
    Flipped180,
    #[serde(rename = "flipped-270")]
    #[strum(serialize = "flipped-270")]
    #[value(name = "flipped-270")]
    Flipped270,
}

impl Transform {
    /// Width and height trade places under these transforms.
    pub fn is_rotated(self) -> bool {
        matches!(
            self,
            Transform::Rotate90
                | Transform::Rotate270
                | Transform::Flipped90
                | Transform::Flipped270
        )
    }
}

/// Output scale in 1/256 units, as carried by `wl_fixed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scale(i32);

impl Scale {
    pub const ONE: Scale = Scale(256);

    pub fn from_raw(raw: i32) -> Self { Self(raw) }

    pub fn from_f64(scale: f64) -> Self { Self((scale * 256.0).round() as i32) }

    pub fn raw(self) -> i32 { self.0 }

    pub fn to_f64(self) -> f64 { self.0 as f64 / 256.0 }
}

impl Default for Scale {
    fn default() -> Self { Scale::ONE }
}

impl std::fmt::Display for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.to_f64())
    }
}

bitflags! {
    /// Properties whose change is in flight in the outstanding transaction.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Pending: u8 {
        const MODE = 1;
        const SCALE = 1 << 1;
        const ENABLED = 1 << 2;
        const POSITION = 1 << 3;
    }
}

/// Staging copy of the live properties; rebuilt from scratch on every pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Desired {
    pub mode: Option<ModeId>,
    pub scale: Scale,
    pub enabled: bool,
    pub transform: Transform,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug)]
pub struct Head {
    pub id: HeadId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub width_mm: i32,
    pub height_mm: i32,
    pub enabled: bool,
    pub current_mode: Option<ModeId>,
    pub preferred_mode: Option<ModeId>,
    pub x: i32,
    pub y: i32,
    pub transform: Transform,
    pub scale: Scale,
    pub make: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub lid_closed: bool,
    pub max_preferred_refresh: bool,
    pub modes_failed: HashSet<ModeId>,
    pub dirty: bool,
    pub pending: Pending,
    pub desired: Desired,
    pub warned_no_mode: bool,
    modes: Vec<Mode>,
}

impl Head {
    pub fn new(id: HeadId) -> Self {
        Self {
            id,
            name: None,
            description: None,
            width_mm: 0,
            height_mm: 0,
            enabled: false,
            current_mode: None,
            preferred_mode: None,
            x: 0,
            y: 0,
            transform: Transform::Normal,
            scale: Scale::ONE,
            make: None,
            model: None,
            serial_number: None,
            lid_closed: false,
            max_preferred_refresh: false,
            modes_failed: HashSet::default(),
            dirty: true,
            pending: Pending::empty(),
            desired: Desired::default(),
            warned_no_mode: false,
            modes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str { self.name.as_deref().unwrap_or("???") }

    pub fn modes(&self) -> &[Mode] { &self.modes }

    pub fn mode(&self, id: ModeId) -> Option<&Mode> { self.modes.iter().find(|m| m.id == id) }

    pub fn mode_mut(&mut self, id: ModeId) -> Option<&mut Mode> {
        self.modes.iter_mut().find(|m| m.id == id)
    }

    pub fn add_mode(&mut self, id: ModeId) -> &mut Mode {
        let idx = match self.modes.iter().position(|m| m.id == id) {
            Some(idx) => idx,
            None => {
                self.modes.push(Mode::new(id));
                self.modes.len() - 1
            }
        };
        &mut self.modes[idx]
    }

    /// Marks `id` as the only preferred mode of this head.
    pub fn set_preferred_mode(&mut self, id: ModeId) {
        if self.mode(id).is_none() {
            return;
        }
        for mode in &mut self.modes {
            mode.preferred = mode.id == id;
        }
        self.preferred_mode = Some(id);
    }

    /// Evicts a withdrawn mode along with every reference to it.
    pub fn remove_mode(&mut self, id: ModeId) -> Option<Mode> {
        let idx = self.modes.iter().position(|m| m.id == id)?;
        let mode = self.modes.remove(idx);

        if self.current_mode == Some(id) {
            self.current_mode = None;
        }
        if self.preferred_mode == Some(id) {
            self.preferred_mode = None;
        }
        if self.desired.mode == Some(id) {
            self.desired.mode = None;
        }
        self.modes_failed.remove(&id);

        Some(mode)
    }

    pub fn current_mode(&self) -> Option<&Mode> { self.current_mode.and_then(|id| self.mode(id)) }

    pub fn desired_mode(&self) -> Option<&Mode> { self.desired.mode.and_then(|id| self.mode(id)) }

    /// Modes the compositor has not rejected for this head.
    pub fn usable_modes(&self) -> impl Iterator<Item = &Mode> + '_ {
        self.modes.iter().filter(|m| !self.modes_failed.contains(&m.id))
    }

    pub fn matches(&self, pattern: &str) -> bool {
        matches_name_desc(pattern, self.name.as_deref(), self.description.as_deref())
    }

    /// Baseline for a desired-state pass: the last reported state.
    pub fn reset_desired(&mut self) {
        self.desired = Desired {
            mode: self.current_mode,
            scale: self.scale,
            enabled: self.enabled,
            transform: self.transform,
            x: self.x,
            y: self.y,
            width: 0,
            height: 0,
        };
    }

    pub fn is_mode_changing(&self) -> bool {
        self.desired.mode.is_some() && self.desired.mode != self.current_mode
    }

    pub fn is_changing(&self) -> bool {
        self.is_mode_changing()
            || self.desired.enabled != self.enabled
            || self.desired.scale != self.scale
            || self.desired.transform != self.transform
            || self.desired.x != self.x
            || self.desired.y != self.y
    }
}

/// Exact name, or case-insensitive substring of the description. Patterns
/// starting with `!` are regular expressions tried against both.
pub fn matches_name_desc(pattern: &str, name: Option<&str>, description: Option<&str>) -> bool {
    if pattern.is_empty() {
        return false;
    }

    if let Some(expr) = pattern.strip_prefix('!') {
        let Ok(re) = Regex::new(expr) else {
            return false;
        };
        return name.is_some_and(|n| re.is_match(n)) || description.is_some_and(|d| re.is_match(d));
    }

    if name == Some(pattern) {
        return true;
    }

    let pattern = pattern.to_lowercase();
    description.is_some_and(|d| d.to_lowercase().contains(&pattern))
}
