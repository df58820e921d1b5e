use std::path::PathBuf;

use super::replay::Record;
use super::{Compositor, ConfigurationRequest, Event, Reactor, ReactorError};
use crate::common::config::Config;
use crate::model::{HeadId, ModeId};

pub fn reactor() -> Reactor { reactor_with(Config::default()) }

pub fn reactor_with(config: Config) -> Reactor {
    Reactor::new(config, PathBuf::from("/nonexistent/way-layout/cfg.toml"), Record::new_for_test())
}

/// Remembers every configuration instead of talking to a compositor.
#[derive(Default, Debug)]
pub struct RecordingCompositor {
    pub requests: Vec<ConfigurationRequest>,
    pub fail_with: Option<String>,
}

impl RecordingCompositor {
    pub fn new() -> Self { Self::default() }

    pub fn take(&mut self) -> Vec<ConfigurationRequest> { std::mem::take(&mut self.requests) }
}

impl Compositor for RecordingCompositor {
    fn apply(&mut self, request: &ConfigurationRequest) -> Result<(), ReactorError> {
        if let Some(reason) = &self.fail_with {
            return Err(ReactorError::Compositor(reason.clone()));
        }
        self.requests.push(request.clone());
        Ok(())
    }
}

pub struct TestMode {
    pub width: i32,
    pub height: i32,
    pub refresh_mhz: i32,
    pub preferred: bool,
}

pub fn mode(width: i32, height: i32, refresh_hz: i32) -> TestMode {
    TestMode {
        width,
        height,
        refresh_mhz: refresh_hz * 1000,
        preferred: false,
    }
}

pub fn preferred(width: i32, height: i32, refresh_hz: i32) -> TestMode {
    TestMode {
        preferred: true,
        ..mode(width, height, refresh_hz)
    }
}

pub fn mode_id(head: u32, idx: usize) -> ModeId { ModeId::new(head * 100 + idx as u32) }

/// The events a compositor sends when announcing a head, ending before `done`.
/// The head reports itself enabled in its first mode at the origin.
pub fn head_events(id: u32, name: &str, size_mm: (i32, i32), modes: &[TestMode]) -> Vec<Event> {
    let head = HeadId::new(id);
    let mut events = vec![
        Event::HeadArrived(head),
        Event::HeadName { head, name: name.to_string() },
        Event::HeadDescription {
            head,
            description: format!("Test Monitor {name}"),
        },
        Event::HeadPhysicalSize {
            head,
            width_mm: size_mm.0,
            height_mm: size_mm.1,
        },
    ];

    for (idx, m) in modes.iter().enumerate() {
        let mode = mode_id(id, idx);
        events.push(Event::ModeArrived { head, mode });
        events.push(Event::ModeSize {
            head,
            mode,
            width: m.width,
            height: m.height,
        });
        events.push(Event::ModeRefresh { head, mode, refresh_mhz: m.refresh_mhz });
        if m.preferred {
            events.push(Event::ModePreferred { head, mode });
        }
    }

    events.push(Event::HeadEnabled { head, enabled: true });
    if !modes.is_empty() {
        events.push(Event::HeadCurrentMode { head, mode: mode_id(id, 0) });
    }
    events.push(Event::HeadPosition { head, x: 0, y: 0 });
    events
}

/// Feeds what a compositor would report after successfully applying `request`.
pub fn simulate_success(reactor: &mut Reactor, request: &ConfigurationRequest) {
    use super::HeadConfiguration;

    reactor.handle_event(Event::ConfigurationSucceeded).unwrap();
    for config in &request.heads {
        let event_batch = match config {
            HeadConfiguration::Mode { head, mode } => vec![
                Event::HeadEnabled { head: *head, enabled: true },
                Event::HeadCurrentMode { head: *head, mode: *mode },
            ],
            HeadConfiguration::Enable { head, scale, x, y, transform } => vec![
                Event::HeadEnabled { head: *head, enabled: true },
                Event::HeadScale { head: *head, scale: *scale },
                Event::HeadPosition { head: *head, x: *x, y: *y },
                Event::HeadTransform { head: *head, transform: *transform },
            ],
            HeadConfiguration::Disable { head } => {
                vec![Event::HeadEnabled { head: *head, enabled: false }]
            }
        };
        reactor.handle_events(event_batch).unwrap();
    }
    let serial = reactor.displ.output_manager.serial + 1;
    reactor.handle_event(Event::ManagerDone { serial }).unwrap();
}

/// Runs layout, applies every request as a success, until nothing more is asked.
pub fn converge(reactor: &mut Reactor, compositor: &mut RecordingCompositor) -> Vec<ConfigurationRequest> {
    let mut all = Vec::new();
    for _ in 0..16 {
        reactor.layout(compositor).unwrap();
        let requests = compositor.take();
        if requests.is_empty() {
            break;
        }
        for request in &requests {
            simulate_success(reactor, request);
        }
        all.extend(requests);
    }
    all
}
