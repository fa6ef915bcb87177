//! Atomic, lock-guarded JSON persistence for the registry store.
//!
//! A sibling lock file guards a full read-modify-write, and writes go
//! through a temp file + rename so readers never observe a torn document.
//! Rather than a blocking `flock`, the lock is acquired by polling
//! exclusive file creation so it can enforce a timeout and stale-lock
//! recovery — a blocking OS flock can't express either.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::model::Store;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_STALE_AGE: Duration = Duration::from_secs(30);

/// Environment variable used to override the default state directory.
pub const STATE_DIR_ENV: &str = "RESEARCH_LOOP_REGISTRY_STATE_DIR";

/// Resolve `<STATE_DIR>/research/loops.json`, honoring `STATE_DIR_ENV`.
pub fn default_store_path() -> PathBuf {
    let state_dir = std::env::var(STATE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("research-loop-registry"));
    state_dir.join("research").join("loops.json")
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut p = store_path.as_os_str().to_owned();
    p.push(".lock");
    PathBuf::from(p)
}

fn tmp_path(store_path: &Path) -> PathBuf {
    let pid = std::process::id();
    let rand_suffix: u32 = rand::thread_rng().gen();
    let mut p = store_path.as_os_str().to_owned();
    p.push(format!(".{pid}.{rand_suffix:08x}.tmp"));
    PathBuf::from(p)
}

/// Read-only load: normalizes but does not repair-and-persist. Missing,
/// unparseable, or wrong-version documents all yield an empty store with no
/// error surfaced on corrupt reads.
pub fn load(store_path: &Path) -> Store {
    let mut store = match fs::read_to_string(store_path) {
        Ok(content) => match serde_json::from_str::<Store>(&content) {
            Ok(store) if store.version == crate::model::SCHEMA_VERSION => store,
            Ok(_) => {
                warn!(path = %store_path.display(), "store version mismatch, treating as empty");
                Store::empty()
            }
            Err(err) => {
                warn!(path = %store_path.display(), error = %err, "store unparseable, treating as empty");
                Store::empty()
            }
        },
        Err(_) => Store::empty(),
    };

    for record in store.loops.values_mut() {
        crate::normalize::normalize_record(record);
    }

    store
}

/// Atomically write the store: serialize, write to a sibling temp file,
/// rename over the target, then (non-Windows) chmod the result to
/// owner-only. Pretty-printed UTF-8 JSON with a trailing newline.
pub fn save(store_path: &Path, store: &Store) -> Result<(), RegistryError> {
    if let Some(parent) = store_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating state directory {}", parent.display()))?;
    }

    let mut json = serde_json::to_vec_pretty(store).context("serializing registry store")?;
    json.push(b'\n');

    let tmp = tmp_path(store_path);
    fs::write(&tmp, &json)
        .with_context(|| format!("writing temp store file {}", tmp.display()))?;

    fs::rename(&tmp, store_path)
        .with_context(|| format!("renaming temp store file into {}", store_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(store_path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("chmod 0600 on {}", store_path.display()))?;
    }

    Ok(())
}

/// A held exclusive lock over `store_path`'s sidecar lock file. Dropping
/// this releases the lock (best-effort unlink).
pub struct LockGuard {
    lock_path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// Acquire the exclusive lock for `store_path`, polling every 25ms and
/// reclaiming a stale (>30s old) lock file on contention, timing out after
/// ~10s.
pub async fn acquire_lock(store_path: &Path) -> Result<LockGuard, RegistryError> {
    let lock = lock_path(store_path);
    if let Some(parent) = lock.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating state directory {}", parent.display()))?;
    }

    let deadline = tokio::time::Instant::now() + LOCK_TIMEOUT;

    loop {
        match OpenOptions::new().write(true).create_new(true).open(&lock) {
            Ok(_) => {
                debug!(path = %lock.display(), "acquired registry lock");
                return Ok(LockGuard { lock_path: lock });
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                if is_stale(&lock) {
                    warn!(path = %lock.display(), "reclaiming stale registry lock");
                    let _ = fs::remove_file(&lock);
                    continue;
                }
            }
            Err(err) => {
                return Err(RegistryError::Io(
                    anyhow::Error::new(err).context("opening registry lock file"),
                ));
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(RegistryError::LockTimeout(lock));
        }
        tokio::time::sleep(LOCK_POLL_INTERVAL).await;
    }
}

fn is_stale(lock: &Path) -> bool {
    fs::metadata(lock)
        .and_then(|m| m.modified())
        .map(|modified| {
            modified
                .elapsed()
                .map(|age| age > LOCK_STALE_AGE)
                .unwrap_or(false)
        })
        .unwrap_or(false)
}

/// Acquire the lock, re-read the store from disk, apply `mutate`, write the
/// result back, then release the lock — the sole primitive every
/// state-mutating registry operation goes through.
pub async fn locked_mutate<F, T>(store_path: &Path, mutate: F) -> Result<T, RegistryError>
where
    F: FnOnce(&mut Store) -> Result<T, RegistryError>,
{
    let _guard = acquire_lock(store_path).await?;
    let mut store = load(store_path);
    let result = mutate(&mut store)?;
    save(store_path, &store)?;
    Ok(result)
}
