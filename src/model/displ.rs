use serde::{Deserialize, Serialize};

use super::output_manager::OutputManager;
use crate::common::config::Config;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    #[default]
    Idle,
    Outstanding,
    Succeeded,
    Failed,
    Cancelled,
}

/// Top-level aggregate handed through the loop by exclusive reference.
#[derive(Debug)]
pub struct Displ {
    pub output_manager: OutputManager,
    pub config: Config,
    /// Last known lid state; `None` when the machine has no lid.
    pub lid_closed: Option<bool>,
    pub status: TransactionStatus,
}

impl Displ {
    pub fn new(config: Config) -> Self {
        Self {
            output_manager: OutputManager::new(),
            config,
            lid_closed: None,
            status: TransactionStatus::Idle,
        }
    }

    /// Propagates the lid state to the laptop panels; returns true if any head changed.
    pub fn update_heads_lid_closed(&mut self) -> bool {
        let closed = self.lid_closed.unwrap_or(false);
        let prefix = self.config.laptop_display_prefix.as_str();
        let mut changed = false;

        for head in self.output_manager.heads_mut() {
            let is_laptop_panel =
                !prefix.is_empty() && head.name.as_deref().is_some_and(|n| n.starts_with(prefix));
            let lid_closed = closed && is_laptop_panel;
            if head.lid_closed != lid_closed {
                head.lid_closed = lid_closed;
                head.dirty = true;
                changed = true;
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HeadId;

    fn displ_with(names: &[&str]) -> Displ {
        let mut displ = Displ::new(Config::default());
        for (i, name) in names.iter().enumerate() {
            displ.output_manager.add_head(HeadId::new(i as u32 + 1)).name = Some(name.to_string());
        }
        displ.output_manager.reset_dirty();
        displ
    }

    #[test]
    fn closed_lid_only_affects_laptop_panels() {
        let mut displ = displ_with(&["eDP-1", "DP-2"]);
        displ.lid_closed = Some(true);

        assert!(displ.update_heads_lid_closed());

        let heads = displ.output_manager.heads();
        assert!(heads[0].lid_closed);
        assert!(!heads[1].lid_closed);
        assert!(displ.output_manager.is_dirty());
    }

    #[test]
    fn unchanged_lid_does_not_dirty() {
        let mut displ = displ_with(&["eDP-1"]);
        displ.lid_closed = Some(false);
        assert!(!displ.update_heads_lid_closed());
        assert!(!displ.output_manager.is_dirty());
    }

    #[test]
    fn opening_the_lid_clears_the_flag() {
        let mut displ = displ_with(&["eDP-1"]);
        displ.lid_closed = Some(true);
        displ.update_heads_lid_closed();
        displ.lid_closed = Some(false);
        assert!(displ.update_heads_lid_closed());
        assert!(!displ.output_manager.heads()[0].lid_closed);
    }

    #[test]
    fn custom_prefix_is_honoured() {
        let mut displ = displ_with(&["LVDS-1", "eDP-1"]);
        displ.config.laptop_display_prefix = "LVDS".into();
        displ.lid_closed = Some(true);
        displ.update_heads_lid_closed();

        let heads = displ.output_manager.heads();
        assert!(heads[0].lid_closed);
        assert!(!heads[1].lid_closed);
    }
}
