use tracing::{debug, info};

use crate::actor::reactor::Reactor;
use crate::common::config::Config;

pub struct SystemEventHandler;

impl SystemEventHandler {
    pub fn handle_config_changed(reactor: &mut Reactor, config: Config) {
        // Our own writes come back through the watcher unchanged.
        if config == reactor.displ.config {
            debug!("configuration file changed without effect");
            return;
        }
        info!("Configuration reloaded");
        reactor.adopt_config(config);
    }

    pub fn handle_lid_changed(reactor: &mut Reactor, closed: bool) {
        if reactor.displ.lid_closed == Some(closed) {
            return;
        }
        info!("Lid {}", if closed { "closed" } else { "opened" });
        reactor.displ.lid_closed = Some(closed);
        if reactor.displ.update_heads_lid_closed() {
            reactor.note_user_change();
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::actor::reactor::SystemEventHandler;
    use crate::actor::reactor::testing::reactor;
    use crate::common::config::{Arrange, Config};

    #[test]
    fn identical_config_is_ignored() {
        let mut reactor = reactor();
        reactor.displ.output_manager.reset_dirty();
        SystemEventHandler::handle_config_changed(&mut reactor, Config::default());
        assert!(!reactor.displ.output_manager.is_dirty());
    }

    #[test]
    fn new_config_dirties_and_restores_retries() {
        let mut reactor = reactor();
        reactor.displ.output_manager.retries = 4;
        let config = Config { arrange: Arrange::Column, ..Config::default() };
        SystemEventHandler::handle_config_changed(&mut reactor, config);
        assert!(reactor.displ.output_manager.is_dirty());
        assert_eq!(reactor.displ.output_manager.retries, 0);
        assert_eq!(reactor.displ.config.arrange, Arrange::Column);
    }

    #[test]
    fn lid_without_panels_changes_nothing() {
        let mut reactor = reactor();
        SystemEventHandler::handle_lid_changed(&mut reactor, true);
        assert_eq!(reactor.displ.lid_closed, Some(true));
        assert_eq!(reactor.displ.output_manager.retries, 0);
    }
}
