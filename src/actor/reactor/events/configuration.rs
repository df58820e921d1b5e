use tracing::{debug, warn};

use crate::actor::reactor::Reactor;
use crate::actor::reactor::transaction_manager::Outcome;
use crate::model::TransactionStatus;

pub struct ConfigurationEventHandler;

impl ConfigurationEventHandler {
    pub fn handle_outcome(reactor: &mut Reactor, outcome: Outcome) {
        if !reactor.transaction_manager.is_outstanding() {
            warn!(?outcome, "configuration outcome without an outstanding transaction");
        }
        debug!(?outcome, retries = reactor.displ.output_manager.retries, "configuration resolved");

        let retrying =
            reactor.transaction_manager.resolve(&mut reactor.displ.output_manager, outcome);
        reactor.abandoned = !retrying;

        reactor.displ.status = match outcome {
            Outcome::Succeeded => TransactionStatus::Succeeded,
            Outcome::Failed => TransactionStatus::Failed,
            Outcome::Cancelled => TransactionStatus::Cancelled,
        };
    }
}
