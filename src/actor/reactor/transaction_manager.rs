use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::error::ReactorError;
use crate::model::{Head, HeadId, ModeId, OutputManager, Pending, Scale, Transform};

/// What one head should become within a configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HeadConfiguration {
    /// Enable with a new mode and nothing else.
    Mode { head: HeadId, mode: ModeId },
    Enable {
        head: HeadId,
        scale: Scale,
        x: i32,
        y: i32,
        transform: Transform,
    },
    Disable { head: HeadId },
}

impl HeadConfiguration {
    pub fn head(&self) -> HeadId {
        match self {
            HeadConfiguration::Mode { head, .. }
            | HeadConfiguration::Enable { head, .. }
            | HeadConfiguration::Disable { head } => *head,
        }
    }
}

/// One transactional `zwlr_output_configuration_v1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRequest {
    pub serial: u32,
    pub heads: Vec<HeadConfiguration>,
}

impl ConfigurationRequest {
    pub fn mode_change(&self) -> Option<(HeadId, ModeId)> {
        match self.heads.as_slice() {
            [HeadConfiguration::Mode { head, mode }] => Some((*head, *mode)),
            _ => None,
        }
    }
}

/// Sends configurations to the compositor. Outcomes come back later as reactor events.
pub trait Compositor {
    fn apply(&mut self, request: &ConfigurationRequest) -> Result<(), ReactorError>;
}

/// How an outstanding transaction was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq)]
struct Transaction {
    mode_change: Option<(HeadId, ModeId)>,
}

/// Tracks the single transaction that may be in flight.
#[derive(Debug, Default)]
pub struct TransactionManager {
    outstanding: Option<Transaction>,
}

impl TransactionManager {
    pub fn new() -> Self { Self::default() }

    pub fn is_outstanding(&self) -> bool { self.outstanding.is_some() }

    /// Diffs desired against current. A mode change goes alone, for the
    /// first such head in discovery order; everything else is bundled.
    pub fn plan(heads: &[Head], serial: u32) -> Option<ConfigurationRequest> {
        let changing: Vec<&Head> = heads.iter().filter(|h| h.is_changing()).collect();
        if changing.is_empty() {
            return None;
        }

        if let Some(head) = changing.iter().find(|h| h.desired.enabled && h.is_mode_changing()) {
            let mode = head.desired.mode?;
            return Some(ConfigurationRequest {
                serial,
                heads: vec![HeadConfiguration::Mode { head: head.id, mode }],
            });
        }

        let heads = changing
            .iter()
            .map(|head| {
                if head.desired.enabled {
                    HeadConfiguration::Enable {
                        head: head.id,
                        scale: head.desired.scale,
                        x: head.desired.x,
                        y: head.desired.y,
                        transform: head.desired.transform,
                    }
                } else {
                    HeadConfiguration::Disable { head: head.id }
                }
            })
            .collect();

        Some(ConfigurationRequest { serial, heads })
    }

    /// Marks the properties in flight and remembers the transaction.
    pub fn begin(&mut self, output_manager: &mut OutputManager, request: &ConfigurationRequest) {
        for config in &request.heads {
            let Some(head) = output_manager.head_mut(config.head()) else {
                continue;
            };
            let pending = pending_for(head, config);
            head.pending |= pending;
            debug!(head = head.name(), pending = ?head.pending, "pending");
        }

        self.outstanding = Some(Transaction { mode_change: request.mode_change() });
    }

    /// Applies the bookkeeping for an outcome; returns false when the
    /// retry budget is spent and the changes were abandoned.
    pub fn resolve(&mut self, output_manager: &mut OutputManager, outcome: Outcome) -> bool {
        let transaction = self.outstanding.take();
        let mode_change = transaction.and_then(|t| t.mode_change);
        output_manager.reset_pending();

        match outcome {
            Outcome::Succeeded => {
                output_manager.retries = 0;
                // Not every compositor reports the new current mode.
                if let Some((id, mode)) = mode_change
                    && let Some(head) = output_manager.head_mut(id)
                {
                    head.current_mode = Some(mode);
                }
                true
            }
            Outcome::Failed | Outcome::Cancelled => {
                if outcome == Outcome::Failed
                    && let Some((id, mode)) = mode_change
                    && let Some(head) = output_manager.head_mut(id)
                {
                    match head.mode(mode) {
                        Some(m) => error!("  {}: mode {} failed", head.name(), m),
                        None => error!("  {}: mode {:?} failed", head.name(), mode),
                    }
                    head.modes_failed.insert(mode);
                    // The reported current mode may be wrong now.
                    head.current_mode = None;
                }

                if output_manager.record_retry() {
                    info!(
                        "Retrying {}/{}",
                        output_manager.retries,
                        crate::model::output_manager::MAX_RETRIES
                    );
                    output_manager.dirty = true;
                    true
                } else {
                    error!("Too many retries, abandoning changes");
                    output_manager.reset_dirty();
                    false
                }
            }
        }
    }
}

fn pending_for(head: &Head, config: &HeadConfiguration) -> Pending {
    let mut pending = Pending::empty();
    match config {
        HeadConfiguration::Mode { .. } => {
            pending |= Pending::MODE;
            if !head.enabled {
                pending |= Pending::ENABLED;
            }
        }
        HeadConfiguration::Enable { scale, x, y, transform, .. } => {
            if !head.enabled {
                pending |= Pending::ENABLED;
            }
            if *scale != head.scale {
                pending |= Pending::SCALE;
            }
            if *x != head.x || *y != head.y || *transform != head.transform {
                pending |= Pending::POSITION;
            }
        }
        HeadConfiguration::Disable { .. } => pending |= Pending::ENABLED,
    }
    pending
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn output_manager() -> OutputManager {
        let mut om = OutputManager::new();
        for id in 1..=3 {
            let head = om.add_head(HeadId::new(id));
            head.name = Some(format!("DP-{id}"));
            head.enabled = true;
            for m in 0..2 {
                let mode = head.add_mode(ModeId::new(id * 10 + m));
                mode.width = 1920 - m as i32 * 640;
                mode.height = 1080 - m as i32 * 360;
                mode.refresh_mhz = 60_000;
            }
            head.current_mode = Some(ModeId::new(id * 10));
            head.x = (id as i32 - 1) * 1920;
            head.reset_desired();
        }
        om.reset_dirty();
        om
    }

    #[test]
    fn nothing_changing_plans_nothing() {
        let om = output_manager();
        assert_eq!(TransactionManager::plan(om.heads(), 1), None);
    }

    #[test]
    fn first_mode_change_goes_alone() {
        let mut om = output_manager();
        om.head_mut(HeadId::new(1)).unwrap().desired.scale = Scale::from_f64(2.0);
        om.head_mut(HeadId::new(2)).unwrap().desired.mode = Some(ModeId::new(21));
        om.head_mut(HeadId::new(3)).unwrap().desired.mode = Some(ModeId::new(31));

        let request = TransactionManager::plan(om.heads(), 7).unwrap();

        assert_eq!(
            request,
            ConfigurationRequest {
                serial: 7,
                heads: vec![HeadConfiguration::Mode {
                    head: HeadId::new(2),
                    mode: ModeId::new(21),
                }],
            }
        );
        assert_eq!(request.mode_change(), Some((HeadId::new(2), ModeId::new(21))));
    }

    #[test]
    fn other_changes_are_bundled() {
        let mut om = output_manager();
        om.head_mut(HeadId::new(1)).unwrap().desired.scale = Scale::from_f64(1.5);
        om.head_mut(HeadId::new(3)).unwrap().desired.enabled = false;

        let request = TransactionManager::plan(om.heads(), 2).unwrap();

        assert_eq!(
            request.heads,
            vec![
                HeadConfiguration::Enable {
                    head: HeadId::new(1),
                    scale: Scale::from_f64(1.5),
                    x: 0,
                    y: 0,
                    transform: Transform::Normal,
                },
                HeadConfiguration::Disable { head: HeadId::new(3) },
            ]
        );
        assert_eq!(request.mode_change(), None);
    }

    #[test]
    fn transform_alone_is_a_change() {
        let mut om = output_manager();
        om.head_mut(HeadId::new(2)).unwrap().desired.transform = Transform::Rotate180;
        let request = TransactionManager::plan(om.heads(), 2).unwrap();
        assert_eq!(request.heads.len(), 1);
        assert_eq!(request.heads[0].head(), HeadId::new(2));
    }

    #[test]
    fn begin_sets_only_changed_flags() {
        let mut om = output_manager();
        om.head_mut(HeadId::new(1)).unwrap().desired.scale = Scale::from_f64(1.5);
        om.head_mut(HeadId::new(2)).unwrap().desired.x = 5000;
        let request = TransactionManager::plan(om.heads(), 2).unwrap();

        let mut tm = TransactionManager::new();
        tm.begin(&mut om, &request);

        assert!(tm.is_outstanding());
        assert_eq!(om.head(HeadId::new(1)).unwrap().pending, Pending::SCALE);
        assert_eq!(om.head(HeadId::new(2)).unwrap().pending, Pending::POSITION);
        assert_eq!(om.head(HeadId::new(3)).unwrap().pending, Pending::empty());
    }

    #[test]
    fn success_adopts_mode_and_resets_retries() {
        let mut om = output_manager();
        om.retries = 2;
        om.head_mut(HeadId::new(1)).unwrap().desired.mode = Some(ModeId::new(11));
        let request = TransactionManager::plan(om.heads(), 2).unwrap();
        let mut tm = TransactionManager::new();
        tm.begin(&mut om, &request);

        assert!(tm.resolve(&mut om, Outcome::Succeeded));

        assert!(!tm.is_outstanding());
        assert!(!om.is_pending());
        assert_eq!(om.retries, 0);
        assert_eq!(om.head(HeadId::new(1)).unwrap().current_mode, Some(ModeId::new(11)));
    }

    #[test]
    fn failed_mode_is_remembered() {
        let mut om = output_manager();
        om.head_mut(HeadId::new(1)).unwrap().desired.mode = Some(ModeId::new(11));
        let request = TransactionManager::plan(om.heads(), 2).unwrap();
        let mut tm = TransactionManager::new();
        tm.begin(&mut om, &request);

        assert!(tm.resolve(&mut om, Outcome::Failed));

        let head = om.head(HeadId::new(1)).unwrap();
        assert!(head.modes_failed.contains(&ModeId::new(11)));
        assert_eq!(head.current_mode, None);
        assert_eq!(om.retries, 1);
        assert!(om.dirty);
    }

    #[test]
    fn cancelled_mode_is_not_penalised() {
        let mut om = output_manager();
        om.head_mut(HeadId::new(1)).unwrap().desired.mode = Some(ModeId::new(11));
        let request = TransactionManager::plan(om.heads(), 2).unwrap();
        let mut tm = TransactionManager::new();
        tm.begin(&mut om, &request);

        assert!(tm.resolve(&mut om, Outcome::Cancelled));

        let head = om.head(HeadId::new(1)).unwrap();
        assert!(head.modes_failed.is_empty());
        assert_eq!(head.current_mode, Some(ModeId::new(10)));
        assert_eq!(om.retries, 1);
    }

    #[test]
    fn retries_are_bounded() {
        let mut om = output_manager();
        let mut tm = TransactionManager::new();
        for _ in 0..crate::model::output_manager::MAX_RETRIES {
            assert!(tm.resolve(&mut om, Outcome::Cancelled));
        }
        om.head_mut(HeadId::new(1)).unwrap().dirty = true;
        assert!(!tm.resolve(&mut om, Outcome::Cancelled));
        assert!(!om.is_dirty());
    }
}
