//! Domain errors for the research loop registry.
//!
//! Every variant corresponds to one of the error-code strings enumerated in
//! the registry's operation contract. `registry::execute` is the only place
//! these ever surface to a caller, folded into `Envelope::Error` — nothing
//! in this crate's public API returns a bare `Result` across the operation
//! boundary.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("loopId required")]
    LoopIdRequired,

    #[error("research loop not found: {0}")]
    NotFound(String),

    #[error("research loop not accessible: {0}")]
    NotAccessible(String),

    #[error("loop must be active to checkpoint (current state: {0})")]
    MustBeActive(String),

    #[error("loop is not awaiting_decision (current state: {0})")]
    NotAwaitingDecision(String),

    #[error("cannot continue: max rounds reached ({0})")]
    MaxRoundsReached(u32),

    #[error("timeout acquiring research loop registry lock: {}", .0.display())]
    LockTimeout(PathBuf),

    #[error("{0}")]
    Validation(String),

    #[error("registry I/O error: {0}")]
    Io(#[from] anyhow::Error),
}

impl RegistryError {
    /// The message placed in the response envelope's `error` field.
    pub fn message(&self) -> String {
        self.to_string()
    }
}
