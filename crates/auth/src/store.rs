//! Ownership and rotation of the active credentials.

use crate::credentials::ApiCredentials;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Default)]
struct StoreInner {
    credentials: Option<Arc<ApiCredentials>>,
    generation: u64,
}

/// Credentials active at one point in time, tagged with the store generation.
#[derive(Debug, Clone)]
pub struct CredentialSnapshot {
    pub credentials: Option<Arc<ApiCredentials>>,
    pub generation: u64,
}

/// Holds zero or one set of credentials and releases replaced ones.
///
/// Every `set` or effective `dispose` bumps the generation, which is how
/// signing providers built from older credentials are recognised as stale.
#[derive(Default)]
pub struct CredentialStore {
    inner: RwLock<StoreInner>,
}

impl CredentialStore {
    pub fn new(credentials: Option<ApiCredentials>) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                credentials: credentials.map(Arc::new),
                generation: 0,
            }),
        }
    }

    /// Replace the active credentials.
    ///
    /// The previous credentials are cleared before this returns; anyone still
    /// holding them (e.g. a stale provider) only sees disposed material.
    /// Passing `None` leaves the store unauthenticated.
    pub fn set(&self, credentials: Option<ApiCredentials>) {
        let previous = {
            let mut inner = self.inner.write();
            inner.generation += 1;
            std::mem::replace(&mut inner.credentials, credentials.map(Arc::new))
        };

        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    /// Active credentials, if any. Do not keep the handle past the next `set`.
    pub fn current(&self) -> Option<Arc<ApiCredentials>> {
        self.inner.read().credentials.clone()
    }

    /// Credentials and generation read atomically.
    pub fn snapshot(&self) -> CredentialSnapshot {
        let inner = self.inner.read();
        CredentialSnapshot {
            credentials: inner.credentials.clone(),
            generation: inner.generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().credentials.is_none()
    }

    /// Clear the active credentials. Safe to call repeatedly.
    pub fn dispose(&self) {
        let previous = {
            let mut inner = self.inner.write();
            let previous = inner.credentials.take();
            if previous.is_some() {
                inner.generation += 1;
            }
            previous
        };

        if let Some(previous) = previous {
            previous.dispose();
        }
    }
}

impl Drop for CredentialStore {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CredentialStore")
            .field("has_credentials", &inner.credentials.is_some())
            .field("generation", &inner.generation)
            .finish()
    }
}
