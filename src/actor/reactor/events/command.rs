use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::actor::reactor::Reactor;
use crate::ipc::{Request, Response};

pub struct CommandEventHandler;

impl CommandEventHandler {
    pub fn handle_request(
        reactor: &mut Reactor,
        request: Request,
        response: Option<oneshot::Sender<Response>>,
    ) {
        info!(?request, "control request");

        let immediate = match request {
            Request::GetConfig => Response::Success { data: reactor.snapshot_value() },
            Request::Apply(cmd) => match reactor.displ.config.apply_command(cmd) {
                Ok(config) => {
                    reactor.adopt_config(config);
                    if let Some(tx) = response {
                        reactor.awaiting_settle.push(tx);
                    }
                    return;
                }
                Err(e) => {
                    warn!("Rejected configuration change: {e}");
                    Response::error(e)
                }
            },
            Request::WriteConfig => match reactor.displ.config.save(reactor.config_path()) {
                Ok(()) => {
                    info!("Wrote {}", reactor.config_path().display());
                    Response::Success { data: reactor.snapshot_value() }
                }
                Err(e) => {
                    error!("Failed to write configuration: {e:#}");
                    Response::error(format!("{e:#}"))
                }
            },
        };

        if let Some(tx) = response {
            _ = tx.send(immediate);
        }
    }
}
