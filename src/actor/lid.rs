//! Polls the lid and reports changes to the reactor.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::actor::reactor::{self, Event};
use crate::sys::lid;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct LidActor<F> {
    read: F,
    last: Option<bool>,
    events_tx: reactor::Sender,
}

impl LidActor<fn() -> Option<bool>> {
    /// Spawns the poller on the current `LocalSet`. Machines without a lid get no task.
    pub fn spawn(events_tx: reactor::Sender) {
        if lid::lid_closed().is_none() {
            info!("No lid found");
            return;
        }
        let actor = LidActor::new(lid::lid_closed as fn() -> Option<bool>, events_tx);
        tokio::task::spawn_local(actor.run(POLL_INTERVAL));
    }
}

impl<F: FnMut() -> Option<bool>> LidActor<F> {
    pub fn new(read: F, events_tx: reactor::Sender) -> Self {
        LidActor { read, last: None, events_tx }
    }

    /// Reads once, sending an event if the state differs from the last read.
    pub fn poll(&mut self) {
        let closed = (self.read)();
        if closed == self.last {
            return;
        }
        self.last = closed;
        if let Some(closed) = closed {
            debug!(closed, "lid changed");
            self.events_tx.send(Event::LidChanged(closed));
        }
    }

    pub async fn run(mut self, period: Duration) {
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            self.poll();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::actor;

    #[test]
    fn only_changes_are_sent() {
        let (tx, mut rx) = actor::channel();
        let mut reads = VecDeque::from([Some(false), Some(false), Some(true), Some(true), Some(false)]);
        let mut actor = LidActor::new(move || reads.pop_front().flatten(), tx);

        for _ in 0..5 {
            actor.poll();
        }

        let mut sent = Vec::new();
        while let Ok((_, event)) = rx.try_recv() {
            let Event::LidChanged(closed) = event else {
                panic!("unexpected event {event:?}");
            };
            sent.push(closed);
        }
        assert_eq!(sent, vec![false, true, false]);
    }
}
