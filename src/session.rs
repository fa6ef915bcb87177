//! Resolves an opaque session key into an `ownerAgentId`.
//!
//! This is a shared helper external to the registry proper. The default
//! implementation here is a stable SHA-256 digest of the session key, which
//! keeps agent ids deterministic for a given key without leaking the key
//! itself into the store — a hosting framework that already has a
//! canonical agent-id scheme can supply its own `SessionResolver` instead.

use sha2::{Digest, Sha256};

pub trait SessionResolver: Send + Sync {
    fn resolve_agent_id(&self, session_key: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256SessionResolver;

impl SessionResolver for Sha256SessionResolver {
    fn resolve_agent_id(&self, session_key: &str) -> String {
        format!("agent:{}", sha256_hex(session_key.as_bytes()))
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    // First 16 hex chars (8 bytes) is plenty of collision resistance for a
    // scoping key and keeps ids short in logs and responses.
    hex::encode(hasher.finalize())[..16].to_string()
}
