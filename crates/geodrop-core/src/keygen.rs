//! Background keypair generation, at most one in flight per identity.
//!
//! Key generation is expensive (an Argon2id pass protects the secret), so it
//! never runs on the request path. A request that finds a flagged identity
//! without a keypair calls [`KeyGenCoordinator::trigger`] and moves on; a later
//! request observes the result through [`KeyPairService::has_keypair`].

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{GeoDropError, GeoDropResult};
use crate::identity::{AnonymousId, Codename};
use crate::keys::KeyPairService;

/// What a call to [`KeyGenCoordinator::trigger`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGenTrigger {
    /// Generation was dispatched.
    Started,
    /// Another generation for the same identity is still running.
    AlreadyRunning,
    /// Nothing to do.
    AlreadyHasKey,
}

/// Deduplicated set of keygen tasks keyed by identity.
pub struct KeyGenCoordinator {
    keys: KeyPairService,
    runtime: Handle,
    in_flight: Arc<Mutex<HashSet<AnonymousId>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Removes the identity from the in-flight set when the task ends, even if
/// the generation panicked.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<AnonymousId>>>,
    id: AnonymousId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
    }
}

impl KeyGenCoordinator {
    pub fn new(keys: KeyPairService, runtime: Handle) -> Self {
        Self {
            keys,
            runtime,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Build a coordinator on the runtime this is called from.
    pub fn on_current_runtime(keys: KeyPairService) -> GeoDropResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| GeoDropError::Config(format!("no tokio runtime: {}", e)))?;
        Ok(Self::new(keys, runtime))
    }

    /// Whether a generation for `id` is currently running.
    pub fn is_running(&self, id: &AnonymousId) -> bool {
        self.in_flight.lock().contains(id)
    }

    /// Start generating a keypair for `id` unless one exists or is underway.
    ///
    /// Never waits for the generation. A second trigger while the first is
    /// running is dropped, not queued.
    pub fn trigger(&self, id: &AnonymousId, codename: &Codename) -> KeyGenTrigger {
        if self.keys.has_keypair(id) {
            return KeyGenTrigger::AlreadyHasKey;
        }
        if !self.in_flight.lock().insert(id.clone()) {
            debug!("Keygen already in flight");
            return KeyGenTrigger::AlreadyRunning;
        }

        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            id: id.clone(),
        };
        let keys = self.keys.clone();
        let codename = codename.clone();

        let handle = self.runtime.spawn_blocking(move || {
            match keys.ensure_keypair(&guard.id, &codename) {
                Ok(true) => info!("Background keygen finished"),
                Ok(false) => debug!("Background keygen found an existing keypair"),
                Err(e) => error!(error = %e, "Background keygen failed"),
            }
            drop(guard);
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
        KeyGenTrigger::Started
    }

    /// Wait for every dispatched generation. For process shutdown only.
    pub async fn drain(&self) {
        let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in pending {
            if let Err(e) = task.await {
                warn!(error = %e, "Keygen task did not complete");
            }
        }
    }
}

impl std::fmt::Debug for KeyGenCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGenCoordinator")
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}
