//! Library interface for the research loop registry.
//! Exposes modules for testing and external use.

pub mod error;
pub mod ids;
pub mod model;
pub mod normalize;
pub mod params;
pub mod persistence;
pub mod registry;
pub mod response;
pub mod scoring;
pub mod session;
pub mod state_machine;
pub mod time;
pub mod triage;

pub use error::RegistryError;
pub use model::{CheckpointRecord, DecisionRecord, LoopRecord, LoopState, Priority, Recommendation, Store};
pub use params::{Params, decode_params};
pub use registry::RegistryService;
pub use response::{Envelope, LoopView, OkPayload};
pub use triage::{ListView, LoopListItem, SpawnAdvice};
