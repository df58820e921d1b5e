use serde::{Deserialize, Serialize};

use super::head::{Head, HeadId, Pending};

/// Transaction attempts tolerated before outstanding changes are abandoned.
pub const MAX_RETRIES: u32 = 3;

/// What remains of a head after the compositor finished it, kept for reporting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepartedHead {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Owns every head announced by the compositor, in discovery order.
#[derive(Debug, Default)]
pub struct OutputManager {
    heads: Vec<Head>,
    heads_arrived: Vec<HeadId>,
    heads_departed: Vec<DepartedHead>,
    pub dirty: bool,
    pub serial: u32,
    pub retries: u32,
}

impl OutputManager {
    pub fn new() -> Self { Self::default() }

    pub fn heads(&self) -> &[Head] { &self.heads }

    pub fn heads_mut(&mut self) -> &mut [Head] { &mut self.heads }

    pub fn head(&self, id: HeadId) -> Option<&Head> { self.heads.iter().find(|h| h.id == id) }

    pub fn head_mut(&mut self, id: HeadId) -> Option<&mut Head> {
        self.heads.iter_mut().find(|h| h.id == id)
    }

    pub fn add_head(&mut self, id: HeadId) -> &mut Head {
        self.dirty = true;
        let idx = match self.heads.iter().position(|h| h.id == id) {
            Some(idx) => idx,
            None => {
                self.heads.push(Head::new(id));
                self.heads_arrived.push(id);
                self.heads.len() - 1
            }
        };
        &mut self.heads[idx]
    }

    /// Erases the head and its modes, remembering it for the departure report.
    pub fn remove_head(&mut self, id: HeadId) -> Option<Head> {
        let idx = self.heads.iter().position(|h| h.id == id)?;
        let head = self.heads.remove(idx);

        self.dirty = true;
        self.heads_arrived.retain(|arrived| *arrived != id);
        self.heads_departed.push(DepartedHead {
            name: head.name.clone(),
            description: head.description.clone(),
        });

        Some(head)
    }

    pub fn take_arrived(&mut self) -> Vec<HeadId> { std::mem::take(&mut self.heads_arrived) }

    pub fn take_departed(&mut self) -> Vec<DepartedHead> {
        std::mem::take(&mut self.heads_departed)
    }

    pub fn is_dirty(&self) -> bool { self.dirty || self.heads.iter().any(|h| h.dirty) }

    pub fn reset_dirty(&mut self) {
        self.dirty = false;
        for head in &mut self.heads {
            head.dirty = false;
        }
    }

    pub fn is_pending(&self) -> bool { self.heads.iter().any(|h| !h.pending.is_empty()) }

    pub fn reset_pending(&mut self) {
        for head in &mut self.heads {
            head.pending = Pending::empty();
        }
    }

    /// Counts one more failed attempt; returns false once the budget is spent.
    pub fn record_retry(&mut self) -> bool {
        self.retries += 1;
        self.retries <= MAX_RETRIES
    }
}
