//! Runs async work to completion from synchronous callers.
//!
//! Blocking on the ambient runtime from inside one of its own tasks
//! deadlocks or panics. When a runtime is already active on the calling
//! thread, the future is driven on a dedicated thread with its own
//! single-threaded runtime and the caller blocks on that thread instead.
//! Otherwise a fresh runtime is created in place.

use std::future::Future;
use thiserror::Error;
use tokio::runtime::{Builder, Handle};

/// Errors raised by the bridge itself.
///
/// Failures of the bridged work are part of its output and pass through
/// unchanged.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The private runtime could not be built.
    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The worker thread could not be spawned.
    #[error("failed to spawn bridge thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Drives `future` to completion and returns its output.
///
/// Safe to call both with and without an active runtime on the current
/// thread. A panic inside the future resumes on the caller's thread.
///
/// # Errors
///
/// Returns [`BridgeError`] when a runtime or worker thread cannot be
/// created.
pub fn block_on<F>(future: F) -> Result<F::Output, BridgeError>
where
    F: Future + Send,
    F::Output: Send,
{
    if Handle::try_current().is_err() {
        return run_to_completion(future);
    }

    std::thread::scope(|scope| {
        let worker = std::thread::Builder::new()
            .name("pipewright-bridge".to_owned())
            .spawn_scoped(scope, move || run_to_completion(future))
            .map_err(BridgeError::Spawn)?;
        match worker.join() {
            Ok(output) => output,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    })
}

fn run_to_completion<F: Future>(future: F) -> Result<F::Output, BridgeError> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(BridgeError::Runtime)?;
    Ok(runtime.block_on(future))
}
