use tracing::{debug, trace, warn};

use crate::actor::reactor::Reactor;
use crate::model::{Head, HeadId, ModeId, Pending, Scale, Transform};

pub struct HeadEventHandler;

fn with_head(reactor: &mut Reactor, id: HeadId, f: impl FnOnce(&mut Head)) {
    match reactor.displ.output_manager.head_mut(id) {
        Some(head) => f(head),
        None => warn!("event for unknown head {:?}", id),
    }
}

impl HeadEventHandler {
    pub fn handle_head_arrived(reactor: &mut Reactor, id: HeadId) {
        debug!(?id, "head arrived");
        reactor.displ.output_manager.add_head(id);
    }

    pub fn handle_head_finished(reactor: &mut Reactor, id: HeadId) {
        debug!(?id, "head finished");
        if reactor.displ.output_manager.remove_head(id).is_none() {
            warn!("finished event for unknown head {:?}", id);
        }
    }

    pub fn handle_name(reactor: &mut Reactor, id: HeadId, name: String) {
        with_head(reactor, id, |head| {
            head.name = Some(name);
            head.dirty = true;
        });
    }

    pub fn handle_description(reactor: &mut Reactor, id: HeadId, description: String) {
        with_head(reactor, id, |head| {
            head.description = Some(description);
            head.dirty = true;
        });
    }

    pub fn handle_physical_size(reactor: &mut Reactor, id: HeadId, width_mm: i32, height_mm: i32) {
        with_head(reactor, id, |head| {
            head.width_mm = width_mm;
            head.height_mm = height_mm;
            head.dirty = true;
        });
    }

    pub fn handle_enabled(reactor: &mut Reactor, id: HeadId, enabled: bool) {
        with_head(reactor, id, |head| {
            head.dirty = !head.pending.contains(Pending::ENABLED) || enabled == head.lid_closed;
            head.enabled = enabled;
        });
    }

    pub fn handle_current_mode(reactor: &mut Reactor, id: HeadId, mode: ModeId) {
        with_head(reactor, id, |head| {
            if head.mode(mode).is_none() {
                warn!("{}: current mode {:?} is not one of its modes", head.name(), mode);
            }
            head.current_mode = Some(mode);
            head.dirty = true;
        });
    }

    pub fn handle_position(reactor: &mut Reactor, id: HeadId, x: i32, y: i32) {
        with_head(reactor, id, |head| {
            head.dirty = !head.pending.contains(Pending::POSITION);
            head.x = x;
            head.y = y;
        });
    }

    pub fn handle_transform(reactor: &mut Reactor, id: HeadId, transform: Transform) {
        with_head(reactor, id, |head| {
            head.dirty = true;
            head.transform = transform;
        });
    }

    pub fn handle_scale(reactor: &mut Reactor, id: HeadId, scale: Scale) {
        with_head(reactor, id, |head| {
            head.dirty = !head.pending.contains(Pending::SCALE);
            head.scale = scale;
        });
    }

    pub fn handle_make(reactor: &mut Reactor, id: HeadId, make: String) {
        with_head(reactor, id, |head| {
            head.make = Some(make);
            head.dirty = true;
        });
    }

    pub fn handle_model(reactor: &mut Reactor, id: HeadId, model: String) {
        with_head(reactor, id, |head| {
            head.model = Some(model);
            head.dirty = true;
        });
    }

    pub fn handle_serial_number(reactor: &mut Reactor, id: HeadId, serial_number: String) {
        with_head(reactor, id, |head| {
            head.serial_number = Some(serial_number);
            head.dirty = true;
        });
    }

    pub fn handle_mode_arrived(reactor: &mut Reactor, id: HeadId, mode: ModeId) {
        with_head(reactor, id, |head| {
            head.dirty = !head.pending.contains(Pending::MODE);
            head.add_mode(mode);
        });
    }

    pub fn handle_mode_size(reactor: &mut Reactor, id: HeadId, mode: ModeId, width: i32, height: i32) {
        with_head(reactor, id, |head| match head.mode_mut(mode) {
            Some(m) => {
                m.width = width;
                m.height = height;
            }
            None => warn!("size for unknown mode {:?}", mode),
        });
    }

    pub fn handle_mode_refresh(reactor: &mut Reactor, id: HeadId, mode: ModeId, refresh_mhz: i32) {
        with_head(reactor, id, |head| match head.mode_mut(mode) {
            Some(m) => m.refresh_mhz = refresh_mhz,
            None => warn!("refresh for unknown mode {:?}", mode),
        });
    }

    pub fn handle_mode_preferred(reactor: &mut Reactor, id: HeadId, mode: ModeId) {
        with_head(reactor, id, |head| head.set_preferred_mode(mode));
    }

    pub fn handle_mode_finished(reactor: &mut Reactor, id: HeadId, mode: ModeId) {
        with_head(reactor, id, |head| {
            if let Some(m) = head.remove_mode(mode) {
                trace!("{}: mode {} withdrawn", head.name(), m);
                head.dirty = true;
            }
        });
    }
}
