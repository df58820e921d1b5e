//! wlr-output-management client. Compositor callbacks become reactor
//! events; configuration requests become transactional configurations.

use std::os::fd::{AsFd, OwnedFd};

use anyhow::{Context, bail};
use tracing::{debug, error, trace, warn};
use wayland_client::backend::WaylandError;
use wayland_client::protocol::wl_output::Transform as WlTransform;
use wayland_client::protocol::wl_registry::{self, WlRegistry};
use wayland_client::{
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum, event_created_child,
};
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_configuration_head_v1::ZwlrOutputConfigurationHeadV1;
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_configuration_v1::{
    self, ZwlrOutputConfigurationV1,
};
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_head_v1::{
    self, ZwlrOutputHeadV1,
};
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_manager_v1::{
    self, ZwlrOutputManagerV1,
};
use wayland_protocols_wlr::output_management::v1::client::zwlr_output_mode_v1::{
    self, ZwlrOutputModeV1,
};

use crate::actor::reactor::{
    Compositor, ConfigurationRequest, Event, HeadConfiguration, ReactorError,
};
use crate::common::collections::HashMap;
use crate::model::{HeadId, ModeId, Scale, Transform};

const MANAGER_INTERFACE: &str = "zwlr_output_manager_v1";
const MANAGER_VERSION: u32 = 4;

fn head_id(head: &ZwlrOutputHeadV1) -> HeadId { HeadId::new(head.id().protocol_id()) }

fn mode_id(mode: &ZwlrOutputModeV1) -> ModeId { ModeId::new(mode.id().protocol_id()) }

pub fn transform_from_wl(transform: WEnum<WlTransform>) -> Transform {
    match transform {
        WEnum::Value(WlTransform::Normal) => Transform::Normal,
        WEnum::Value(WlTransform::_90) => Transform::Rotate90,
        WEnum::Value(WlTransform::_180) => Transform::Rotate180,
        WEnum::Value(WlTransform::_270) => Transform::Rotate270,
        WEnum::Value(WlTransform::Flipped) => Transform::Flipped,
        WEnum::Value(WlTransform::Flipped90) => Transform::Flipped90,
        WEnum::Value(WlTransform::Flipped180) => Transform::Flipped180,
        WEnum::Value(WlTransform::Flipped270) => Transform::Flipped270,
        other => {
            warn!("unknown transform {:?}", other);
            Transform::Normal
        }
    }
}

pub fn transform_to_wl(transform: Transform) -> WlTransform {
    match transform {
        Transform::Normal => WlTransform::Normal,
        Transform::Rotate90 => WlTransform::_90,
        Transform::Rotate180 => WlTransform::_180,
        Transform::Rotate270 => WlTransform::_270,
        Transform::Flipped => WlTransform::Flipped,
        Transform::Flipped90 => WlTransform::Flipped90,
        Transform::Flipped180 => WlTransform::Flipped180,
        Transform::Flipped270 => WlTransform::Flipped270,
    }
}

/// Dispatch state: live proxies and the events not yet handed to the reactor.
#[derive(Default)]
pub struct WaylandState {
    manager: Option<(u32, ZwlrOutputManagerV1)>,
    heads: HashMap<HeadId, ZwlrOutputHeadV1>,
    modes: HashMap<ModeId, (HeadId, ZwlrOutputModeV1)>,
    events: Vec<Event>,
}

impl WaylandState {
    fn push(&mut self, event: Event) {
        trace!(?event, "wayland");
        self.events.push(event);
    }
}

impl Dispatch<WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global { name, interface, version } => {
                if interface == MANAGER_INTERFACE && state.manager.is_none() {
                    debug!("binding {} v{}", interface, version.min(MANAGER_VERSION));
                    let manager: ZwlrOutputManagerV1 =
                        registry.bind(name, version.min(MANAGER_VERSION), qh, ());
                    state.manager = Some((name, manager));
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                if state.manager.as_ref().is_some_and(|(n, _)| *n == name) {
                    error!("{} global removed", MANAGER_INTERFACE);
                    state.manager = None;
                    state.push(Event::ManagerFinished);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrOutputManagerV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _manager: &ZwlrOutputManagerV1,
        event: zwlr_output_manager_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_output_manager_v1::Event::Head { head } => {
                let id = head_id(&head);
                state.heads.insert(id, head);
                state.push(Event::HeadArrived(id));
            }
            zwlr_output_manager_v1::Event::Done { serial } => {
                state.push(Event::ManagerDone { serial });
            }
            zwlr_output_manager_v1::Event::Finished => {
                state.manager = None;
                state.push(Event::ManagerFinished);
            }
            _ => {}
        }
    }

    event_created_child!(WaylandState, ZwlrOutputManagerV1, [
        zwlr_output_manager_v1::EVT_HEAD_OPCODE => (ZwlrOutputHeadV1, ()),
    ]);
}

impl Dispatch<ZwlrOutputHeadV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        proxy: &ZwlrOutputHeadV1,
        event: zwlr_output_head_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        use zwlr_output_head_v1::Event as E;

        let head = head_id(proxy);
        let event = match event {
            E::Name { name } => Event::HeadName { head, name },
            E::Description { description } => Event::HeadDescription { head, description },
            E::PhysicalSize { width, height } => Event::HeadPhysicalSize {
                head,
                width_mm: width,
                height_mm: height,
            },
            E::Mode { mode } => {
                let id = mode_id(&mode);
                state.modes.insert(id, (head, mode));
                Event::ModeArrived { head, mode: id }
            }
            E::Enabled { enabled } => Event::HeadEnabled { head, enabled: enabled != 0 },
            E::CurrentMode { mode } => Event::HeadCurrentMode { head, mode: mode_id(&mode) },
            E::Position { x, y } => Event::HeadPosition { head, x, y },
            E::Transform { transform } => Event::HeadTransform {
                head,
                transform: transform_from_wl(transform),
            },
            E::Scale { scale } => Event::HeadScale { head, scale: Scale::from_f64(scale) },
            E::Make { make } => Event::HeadMake { head, make },
            E::Model { model } => Event::HeadModel { head, model },
            E::SerialNumber { serial_number } => Event::HeadSerialNumber { head, serial_number },
            E::Finished => {
                state.heads.remove(&head);
                state.modes.retain(|_, (owner, _)| *owner != head);
                if proxy.version() >= 3 {
                    proxy.release();
                }
                Event::HeadFinished(head)
            }
            _ => return,
        };
        state.push(event);
    }

    event_created_child!(WaylandState, ZwlrOutputHeadV1, [
        zwlr_output_head_v1::EVT_MODE_OPCODE => (ZwlrOutputModeV1, ()),
    ]);
}

impl Dispatch<ZwlrOutputModeV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        proxy: &ZwlrOutputModeV1,
        event: zwlr_output_mode_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let mode = mode_id(proxy);
        let Some(head) = state.modes.get(&mode).map(|(head, _)| *head) else {
            trace!(?mode, "event for a mode without a head");
            return;
        };

        let event = match event {
            zwlr_output_mode_v1::Event::Size { width, height } => {
                Event::ModeSize { head, mode, width, height }
            }
            zwlr_output_mode_v1::Event::Refresh { refresh } => {
                Event::ModeRefresh { head, mode, refresh_mhz: refresh }
            }
            zwlr_output_mode_v1::Event::Preferred => Event::ModePreferred { head, mode },
            zwlr_output_mode_v1::Event::Finished => {
                state.modes.remove(&mode);
                if proxy.version() >= 3 {
                    proxy.release();
                }
                Event::ModeFinished { head, mode }
            }
            _ => return,
        };
        state.push(event);
    }
}

impl Dispatch<ZwlrOutputConfigurationV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        configuration: &ZwlrOutputConfigurationV1,
        event: zwlr_output_configuration_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let event = match event {
            zwlr_output_configuration_v1::Event::Succeeded => Event::ConfigurationSucceeded,
            zwlr_output_configuration_v1::Event::Failed => Event::ConfigurationFailed,
            zwlr_output_configuration_v1::Event::Cancelled => Event::ConfigurationCancelled,
            _ => return,
        };
        configuration.destroy();
        state.push(event);
    }
}

impl Dispatch<ZwlrOutputConfigurationHeadV1, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _proxy: &ZwlrOutputConfigurationHeadV1,
        _event: <ZwlrOutputConfigurationHeadV1 as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

/// The compositor connection, its queue and the dispatch state.
pub struct Wayland {
    connection: Connection,
    queue: EventQueue<WaylandState>,
    state: WaylandState,
}

impl Wayland {
    /// Connects, binds the output manager and fails if the compositor lacks it.
    pub fn connect() -> anyhow::Result<Wayland> {
        let connection =
            Connection::connect_to_env().context("Could not connect to the Wayland display")?;
        let mut queue = connection.new_event_queue();
        let qh = queue.handle();
        let _registry = connection.display().get_registry(&qh, ());

        let mut state = WaylandState::default();
        queue.roundtrip(&mut state).context("Wayland roundtrip failed")?;

        if state.manager.is_none() {
            bail!("compositor does not support {MANAGER_INTERFACE}");
        }

        Ok(Wayland { connection, queue, state })
    }

    /// A duplicate of the connection fd, for readiness polling.
    pub fn poll_fd(&self) -> std::io::Result<OwnedFd> { self.queue.as_fd().try_clone_to_owned() }

    /// Reads whatever is available without blocking and returns the resulting events.
    pub fn dispatch(&mut self) -> anyhow::Result<Vec<Event>> {
        self.queue.dispatch_pending(&mut self.state)?;

        if let Some(guard) = self.queue.prepare_read() {
            match guard.read() {
                Ok(_) => {
                    self.queue.dispatch_pending(&mut self.state)?;
                }
                Err(WaylandError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e).context("Wayland read failed"),
            }
        }

        self.flush()?;
        Ok(std::mem::take(&mut self.state.events))
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        self.connection.flush().context("Wayland flush failed")
    }

    fn configure(
        &self,
        configuration: &ZwlrOutputConfigurationV1,
        request: &ConfigurationRequest,
    ) -> Result<(), ReactorError> {
        let qh = self.queue.handle();

        for config in &request.heads {
            let id = config.head();
            let head = self.state.heads.get(&id).ok_or(ReactorError::HeadNotFound(id))?;

            match config {
                HeadConfiguration::Mode { mode, .. } => {
                    let (_, mode_proxy) = self
                        .state
                        .modes
                        .get(mode)
                        .ok_or(ReactorError::ModeNotFound(id, *mode))?;
                    let head_config = configuration.enable_head(head, &qh, ());
                    head_config.set_mode(mode_proxy);
                }
                HeadConfiguration::Enable { scale, x, y, transform, .. } => {
                    let head_config = configuration.enable_head(head, &qh, ());
                    head_config.set_scale(scale.to_f64());
                    head_config.set_position(*x, *y);
                    head_config.set_transform(transform_to_wl(*transform));
                }
                HeadConfiguration::Disable { .. } => configuration.disable_head(head),
            }
        }

        Ok(())
    }
}

impl Compositor for Wayland {
    fn apply(&mut self, request: &ConfigurationRequest) -> Result<(), ReactorError> {
        let (_, manager) = self.state.manager.as_ref().ok_or(ReactorError::NoOutputManager)?;
        let configuration = manager.create_configuration(request.serial, &self.queue.handle(), ());

        if let Err(e) = self.configure(&configuration, request) {
            configuration.destroy();
            return Err(e);
        }

        configuration.apply();
        self.connection.flush().map_err(|e| ReactorError::Compositor(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_map_both_ways() {
        for transform in [
            Transform::Normal,
            Transform::Rotate90,
            Transform::Rotate180,
            Transform::Rotate270,
            Transform::Flipped,
            Transform::Flipped90,
            Transform::Flipped180,
            Transform::Flipped270,
        ] {
            assert_eq!(transform_from_wl(WEnum::Value(transform_to_wl(transform))), transform);
        }
    }

    #[test]
    fn unknown_transform_is_normal() {
        assert_eq!(transform_from_wl(WEnum::Unknown(42)), Transform::Normal);
    }
}
