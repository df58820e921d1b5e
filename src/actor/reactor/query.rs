use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::actor::reactor::Reactor;
use crate::common::config::Config;
use crate::model::{Head, Mode, Transform};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HeadSummary {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    pub mode: Option<String>,
    pub scale: f64,
    pub x: i32,
    pub y: i32,
    pub transform: Transform,
    pub lid_closed: bool,
    pub failed_modes: Vec<String>,
}

impl From<&Head> for HeadSummary {
    fn from(head: &Head) -> Self {
        HeadSummary {
            name: head.name.clone(),
            description: head.description.clone(),
            enabled: head.enabled,
            mode: head.current_mode().map(Mode::to_string),
            scale: head.scale.to_f64(),
            x: head.x,
            y: head.y,
            transform: head.transform,
            lid_closed: head.lid_closed,
            failed_modes: head
                .modes()
                .iter()
                .filter(|m| head.modes_failed.contains(&m.id))
                .map(Mode::to_string)
                .collect(),
        }
    }
}

/// Reply payload of the control protocol: effective config plus head state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub config: Config,
    pub lid_closed: Option<bool>,
    pub heads: Vec<HeadSummary>,
}

impl Reactor {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            config: self.displ.config.clone(),
            lid_closed: self.displ.lid_closed,
            heads: self.displ.output_manager.heads().iter().map(HeadSummary::from).collect(),
        }
    }

    pub(super) fn snapshot_value(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or_else(|e| {
            error!("Failed to serialize snapshot: {e}");
            Value::Null
        })
    }
}

