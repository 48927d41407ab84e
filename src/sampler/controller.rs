//! Start/stop handle for the sampler task.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::Sampler;

/// Owns the spawned sampler task and its cancellation token. The supervisor
/// cancels, then awaits completion under its shutdown deadline.
pub struct SamplerController {
    handle: JoinHandle<Result<()>>,
    cancel_token: CancellationToken,
}

impl SamplerController {
    /// Spawns the sampler loop. `flush_rx` is the buffer's coalesced
    /// flush-suggestion channel.
    pub fn start(sampler: Sampler, flush_rx: mpsc::Receiver<()>) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampler.run(flush_rx, cancel_token.clone()));

        Self {
            handle,
            cancel_token,
        }
    }

    /// Requests shutdown: the tick loop stops, companion tasks exit, and the
    /// final drain runs. Idempotent.
    pub fn request_stop(&self) {
        self.cancel_token.cancel();
    }

    /// The underlying task handle, for supervisors that select over "task
    /// finished on its own" alongside other events.
    pub fn handle_mut(&mut self) -> &mut JoinHandle<Result<()>> {
        &mut self.handle
    }

    /// Waits for the sampler task to finish and returns its result.
    pub async fn join(self) -> Result<()> {
        self.handle.await.context("sampler task failed to join")?
    }
}
