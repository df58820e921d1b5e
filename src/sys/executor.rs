//! Runs the daemon's futures on the calling thread.

use std::future::Future;

use tokio::runtime;
use tokio::task::LocalSet;

pub struct Executor;

impl Executor {
    /// Blocks on `task` inside a current-thread runtime. Tasks spawned with
    /// `spawn_local` from within it share the thread.
    pub fn run<F: Future>(task: F) -> std::io::Result<F::Output> {
        let rt = runtime::Builder::new_current_thread().enable_all().build()?;
        let local = LocalSet::new();
        Ok(local.block_on(&rt, task))
    }
}
