//! The reactor owns the output model and applies every event to it on the
//! loop thread. After each wake-up the loop calls [`Reactor::layout`], which
//! recomputes the desired state and starts a transaction when needed.

mod error;
pub mod events;
mod query;
pub mod replay;
pub mod transaction_manager;

#[cfg(test)]
pub mod testing;

use std::path::PathBuf;

pub use error::ReactorError;
pub use events::command::CommandEventHandler;
pub use events::configuration::ConfigurationEventHandler;
pub use events::head::HeadEventHandler;
pub use events::system::SystemEventHandler;
pub use query::{HeadSummary, Snapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};
pub use transaction_manager::{
    Compositor, ConfigurationRequest, HeadConfiguration, Outcome, TransactionManager,
};

use self::replay::Record;
use crate::actor;
use crate::common::config::Config;
use crate::common::log;
use crate::ipc::{Request, Response};
use crate::layout_engine::desire;
use crate::model::info::{HeadEvent, report_departed, report_head};
use crate::model::{Displ, HeadId, ModeId, Scale, Transform, TransactionStatus};

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Serialize, Deserialize, Debug)]
pub enum Event {
    HeadArrived(HeadId),
    HeadName { head: HeadId, name: String },
    HeadDescription { head: HeadId, description: String },
    HeadPhysicalSize { head: HeadId, width_mm: i32, height_mm: i32 },
    HeadEnabled { head: HeadId, enabled: bool },
    HeadCurrentMode { head: HeadId, mode: ModeId },
    HeadPosition { head: HeadId, x: i32, y: i32 },
    HeadTransform { head: HeadId, transform: Transform },
    HeadScale { head: HeadId, scale: Scale },
    HeadMake { head: HeadId, make: String },
    HeadModel { head: HeadId, model: String },
    HeadSerialNumber { head: HeadId, serial_number: String },
    HeadFinished(HeadId),

    ModeArrived { head: HeadId, mode: ModeId },
    ModeSize { head: HeadId, mode: ModeId, width: i32, height: i32 },
    ModeRefresh { head: HeadId, mode: ModeId, refresh_mhz: i32 },
    ModePreferred { head: HeadId, mode: ModeId },
    ModeFinished { head: HeadId, mode: ModeId },

    ManagerDone { serial: u32 },
    ManagerFinished,

    ConfigurationSucceeded,
    ConfigurationFailed,
    ConfigurationCancelled,

    ConfigChanged(Config),
    LidChanged(bool),

    Command {
        request: Request,
        #[serde(skip)]
        response: Option<oneshot::Sender<Response>>,
    },
}

pub struct Reactor {
    pub displ: Displ,
    pub transaction_manager: TransactionManager,
    config_path: PathBuf,
    record: Record,
    /// Replies owed to `Apply` requests, sent once the layout settles.
    awaiting_settle: Vec<oneshot::Sender<Response>>,
    manager_ready: bool,
    user_changes: bool,
    abandoned: bool,
}

impl Reactor {
    pub fn new(config: Config, config_path: PathBuf, mut record: Record) -> Reactor {
        record.start(&config);
        Reactor {
            displ: Displ::new(config),
            transaction_manager: TransactionManager::new(),
            config_path,
            record,
            awaiting_settle: Vec::new(),
            manager_ready: false,
            user_changes: false,
            abandoned: false,
        }
    }

    pub fn config_path(&self) -> &std::path::Path { &self.config_path }

    pub fn handle_events(&mut self, events: Vec<Event>) -> Result<(), ReactorError> {
        for event in events {
            self.handle_event(event)?;
        }
        Ok(())
    }

    #[instrument(name = "reactor::handle_event", skip(self))]
    pub fn handle_event(&mut self, event: Event) -> Result<(), ReactorError> {
        self.record.on_event(&event);

        match event {
            Event::HeadArrived(head) => HeadEventHandler::handle_head_arrived(self, head),
            Event::HeadName { head, name } => HeadEventHandler::handle_name(self, head, name),
            Event::HeadDescription { head, description } => {
                HeadEventHandler::handle_description(self, head, description)
            }
            Event::HeadPhysicalSize { head, width_mm, height_mm } => {
                HeadEventHandler::handle_physical_size(self, head, width_mm, height_mm)
            }
            Event::HeadEnabled { head, enabled } => {
                HeadEventHandler::handle_enabled(self, head, enabled)
            }
            Event::HeadCurrentMode { head, mode } => {
                HeadEventHandler::handle_current_mode(self, head, mode)
            }
            Event::HeadPosition { head, x, y } => HeadEventHandler::handle_position(self, head, x, y),
            Event::HeadTransform { head, transform } => {
                HeadEventHandler::handle_transform(self, head, transform)
            }
            Event::HeadScale { head, scale } => HeadEventHandler::handle_scale(self, head, scale),
            Event::HeadMake { head, make } => HeadEventHandler::handle_make(self, head, make),
            Event::HeadModel { head, model } => HeadEventHandler::handle_model(self, head, model),
            Event::HeadSerialNumber { head, serial_number } => {
                HeadEventHandler::handle_serial_number(self, head, serial_number)
            }
            Event::HeadFinished(head) => HeadEventHandler::handle_head_finished(self, head),
            Event::ModeArrived { head, mode } => {
                HeadEventHandler::handle_mode_arrived(self, head, mode)
            }
            Event::ModeSize { head, mode, width, height } => {
                HeadEventHandler::handle_mode_size(self, head, mode, width, height)
            }
            Event::ModeRefresh { head, mode, refresh_mhz } => {
                HeadEventHandler::handle_mode_refresh(self, head, mode, refresh_mhz)
            }
            Event::ModePreferred { head, mode } => {
                HeadEventHandler::handle_mode_preferred(self, head, mode)
            }
            Event::ModeFinished { head, mode } => {
                HeadEventHandler::handle_mode_finished(self, head, mode)
            }
            Event::ManagerDone { serial } => {
                debug!(serial, "output manager done");
                self.displ.output_manager.serial = serial;
                self.manager_ready = true;
            }
            Event::ManagerFinished => return Err(ReactorError::ManagerFinished),
            Event::ConfigurationSucceeded => {
                ConfigurationEventHandler::handle_outcome(self, Outcome::Succeeded)
            }
            Event::ConfigurationFailed => {
                ConfigurationEventHandler::handle_outcome(self, Outcome::Failed)
            }
            Event::ConfigurationCancelled => {
                ConfigurationEventHandler::handle_outcome(self, Outcome::Cancelled)
            }
            Event::ConfigChanged(config) => SystemEventHandler::handle_config_changed(self, config),
            Event::LidChanged(closed) => SystemEventHandler::handle_lid_changed(self, closed),
            Event::Command { request, response } => {
                CommandEventHandler::handle_request(self, request, response)
            }
        }

        Ok(())
    }

    /// Runs once per loop iteration, after all pending events were handled.
    #[instrument(name = "reactor::layout", skip_all)]
    pub fn layout(&mut self, compositor: &mut impl Compositor) -> Result<(), ReactorError> {
        self.report_arrived_departed();
        self.displ.update_heads_lid_closed();

        match self.displ.status {
            TransactionStatus::Outstanding => return Ok(()),
            TransactionStatus::Succeeded => info!("Changes successful"),
            TransactionStatus::Failed => error!("Changes failed"),
            TransactionStatus::Cancelled => {
                warn!("Changes cancelled");
                self.displ.status = TransactionStatus::Idle;
                // The compositor follows a cancel with fresh state.
                return Ok(());
            }
            TransactionStatus::Idle => {}
        }
        self.displ.status = TransactionStatus::Idle;

        if self.manager_ready && self.displ.output_manager.is_dirty() {
            self.displ.output_manager.reset_dirty();
            desire(&mut self.displ);

            let serial = self.displ.output_manager.serial;
            match TransactionManager::plan(self.displ.output_manager.heads(), serial) {
                Some(request) => self.apply(compositor, request)?,
                None if self.user_changes => info!("No changes needed"),
                None => {}
            }
        }

        self.user_changes = false;
        if self.displ.status != TransactionStatus::Outstanding {
            self.settle();
        }

        Ok(())
    }

    fn apply(
        &mut self,
        compositor: &mut impl Compositor,
        request: ConfigurationRequest,
    ) -> Result<(), ReactorError> {
        for config in &request.heads {
            if let Some(head) = self.displ.output_manager.head(config.head()) {
                report_head(head, HeadEvent::Delta);
            }
        }

        compositor.apply(&request)?;

        self.transaction_manager.begin(&mut self.displ.output_manager, &request);
        self.displ.status = TransactionStatus::Outstanding;
        Ok(())
    }

    fn report_arrived_departed(&mut self) {
        let arrived = self.displ.output_manager.take_arrived();
        let departed = self.displ.output_manager.take_departed();
        if arrived.is_empty() && departed.is_empty() {
            return;
        }

        for id in arrived {
            if let Some(head) = self.displ.output_manager.head(id) {
                report_head(head, HeadEvent::Arrived);
            }
        }
        for head in &departed {
            report_departed(head);
        }

        self.note_user_change();
    }

    /// External input restores the retry budget.
    pub(super) fn note_user_change(&mut self) {
        self.user_changes = true;
        self.abandoned = false;
        self.displ.output_manager.retries = 0;
    }

    pub(super) fn adopt_config(&mut self, config: Config) {
        log::set_threshold(config.log_threshold);
        self.displ.config = config;
        self.displ.output_manager.dirty = true;
        self.note_user_change();
    }

    fn settle(&mut self) {
        if self.awaiting_settle.is_empty() {
            return;
        }

        let response = if self.abandoned {
            Response::error("Changes could not be applied, abandoned after retries")
        } else {
            Response::Success { data: self.snapshot_value() }
        };
        for tx in self.awaiting_settle.drain(..) {
            _ = tx.send(response.clone());
        }
    }

    pub fn is_settled(&self) -> bool {
        self.displ.status != TransactionStatus::Outstanding && !self.displ.output_manager.is_dirty()
    }
}
