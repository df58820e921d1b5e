//! The daemon's main loop: compositor socket, reactor events and signals,
//! all on one thread.

use std::path::PathBuf;

use anyhow::Context;
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, info_span};

use crate::actor;
use crate::actor::config_watcher::ConfigWatcher;
use crate::actor::lid::LidActor;
use crate::actor::reactor::Reactor;
use crate::actor::reactor::replay::Record;
use crate::common::config::Config;
use crate::ipc::{self, IpcServer};
use crate::sys::executor::Executor;
use crate::sys::wayland::Wayland;

pub struct Options {
    pub config: Config,
    pub config_path: PathBuf,
    pub record: Record,
}

/// Runs until a terminating signal. Errors are fatal to the daemon.
pub fn run(options: Options) -> anyhow::Result<()> {
    Executor::run(serve(options)).context("Could not start the runtime")?
}

async fn serve(options: Options) -> anyhow::Result<()> {
    let Options { config, config_path, record } = options;

    let mut wayland = Wayland::connect()?;
    let wayland_fd = AsyncFd::with_interest(wayland.poll_fd()?, Interest::READABLE)?;

    let (events_tx, mut events_rx) = actor::channel();
    let _ipc = IpcServer::bind(&ipc::socket_path(), events_tx.clone())?;
    ConfigWatcher::spawn(config_path.clone(), events_tx.clone());
    LidActor::spawn(events_tx.clone());

    let mut reactor = Reactor::new(config, config_path, record);

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;

    loop {
        {
            let _span = info_span!("iteration").entered();
            let events = wayland.dispatch()?;
            reactor.handle_events(events)?;
            reactor.layout(&mut wayland)?;
            wayland.flush()?;
        }

        tokio::select! {
            ready = wayland_fd.readable() => ready?.clear_ready(),
            Some((span, event)) = events_rx.recv() => {
                let _guard = span.enter();
                reactor.handle_event(event)?;
            }
            _ = sigint.recv() => {
                info!("SIGINT, exiting");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM, exiting");
                break;
            }
            _ = sigquit.recv() => {
                info!("SIGQUIT, exiting");
                break;
            }
            _ = sighup.recv() => {
                info!("SIGHUP, exiting");
                break;
            }
        }
    }

    Ok(())
}
