//! Random identifier generation as an injected capability.
//!
//! Random identifiers sit alongside time and the file
//! system as capabilities the registry treats as injected rather than
//! reaching for directly, so `loopId` generation goes through this trait.

use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    /// Generate a new, effectively-unique loop id.
    fn new_loop_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_loop_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
