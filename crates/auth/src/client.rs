//! Per-API client state: credentials plus a lazily built signing provider.

use crate::canonical;
use crate::clock::{Clock, SystemClock};
use crate::credentials::ApiCredentials;
use crate::error::{CredentialsError, SigningError};
use crate::provider::{AuthenticationProvider, ProviderFactory};
use crate::request::{SignedRequest, UnsignedRequest};
use crate::store::CredentialStore;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Options shared by every API of one exchange client.
#[derive(Debug, Default)]
pub struct ClientOptions {
    /// Credentials used by any API that does not set its own.
    pub credentials: Option<ApiCredentials>,
}

impl ClientOptions {
    /// Read credentials from `{PREFIX}_API_KEY` / `{PREFIX}_API_SECRET`.
    ///
    /// If neither variable is set the client is unauthenticated. Setting only
    /// one of them, or malformed values, is an error.
    pub fn from_env(prefix: &str) -> Result<Self, CredentialsError> {
        let credentials = match ApiCredentials::from_env(prefix) {
            Ok(credentials) => Some(credentials),
            Err(CredentialsError::MissingEnvVar(var)) => {
                let key_set = std::env::var_os(format!("{prefix}_API_KEY")).is_some();
                let secret_set = std::env::var_os(format!("{prefix}_API_SECRET")).is_some();
                if key_set || secret_set {
                    return Err(CredentialsError::InvalidCredentials(format!(
                        "{var} is not set but its counterpart is"
                    )));
                }
                tracing::debug!(var = %var, "No API credentials in environment");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self { credentials })
    }
}

/// Options for a single API (e.g. spot REST, futures REST).
#[derive(Debug, Default)]
pub struct ApiClientOptions {
    pub base_address: String,
    /// Overrides `ClientOptions::credentials` for this API.
    pub credentials: Option<ApiCredentials>,
}

impl ApiClientOptions {
    pub fn new(base_address: impl Into<String>) -> Self {
        Self {
            base_address: base_address.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Lifecycle of the signing provider relative to the active credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// No provider has been built for any credentials still in use.
    Uninitialized,
    /// A provider built from the active credentials is cached.
    Ready,
    /// Credentials were rotated after the cached provider was built.
    Stale,
}

type ProviderSlot = Option<(u64, Arc<dyn AuthenticationProvider>)>;

/// Base for exchange API clients.
///
/// Owns a copy of the credentials and builds the signing provider on first
/// use. Rotating credentials invalidates the provider; the next access
/// rebuilds it from the new credentials.
pub struct ApiClient {
    base_address: String,
    store: CredentialStore,
    provider: Mutex<ProviderSlot>,
    factory: Box<dyn ProviderFactory>,
    clock: Arc<dyn Clock>,
}

impl ApiClient {
    /// Create a client. Credentials are copied from `api_options`, falling
    /// back to `client_options`.
    ///
    /// # Errors
    /// Returns `CredentialsError::InvalidCredentials` if the supplied
    /// credentials were already disposed.
    pub fn new(
        client_options: &ClientOptions,
        api_options: &ApiClientOptions,
        factory: impl ProviderFactory + 'static,
    ) -> Result<Self, CredentialsError> {
        let source = api_options
            .credentials
            .as_ref()
            .or(client_options.credentials.as_ref());

        let credentials = match source {
            Some(credentials) => Some(credentials.copy().ok_or_else(|| {
                CredentialsError::InvalidCredentials("credentials were already disposed".into())
            })?),
            None => None,
        };

        tracing::debug!(
            base_address = %api_options.base_address,
            authenticated = credentials.is_some(),
            "API client created"
        );

        Ok(Self {
            base_address: api_options.base_address.clone(),
            store: CredentialStore::new(credentials),
            provider: Mutex::new(None),
            factory: Box::new(factory),
            clock: Arc::new(SystemClock::new()),
        })
    }

    /// Replace the clock used to timestamp requests that carry none.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.store
    }

    /// Rotate credentials. `None` makes the client unauthenticated.
    ///
    /// The previous secret is cleared before this returns and any provider
    /// built from it becomes stale.
    pub fn set_api_credentials(&self, credentials: Option<ApiCredentials>) {
        let authenticated = credentials.is_some();
        self.store.set(credentials);
        tracing::info!(
            base_address = %self.base_address,
            authenticated,
            "API credentials rotated"
        );
    }

    /// The signing provider for the active credentials, built on first use.
    ///
    /// Returns `None` when no credentials are set. Concurrent callers share a
    /// single build per credentials generation.
    pub fn authentication_provider(&self) -> Option<Arc<dyn AuthenticationProvider>> {
        let mut slot = self.provider.lock();
        let snapshot = self.store.snapshot();

        let Some(credentials) = snapshot.credentials else {
            if slot.take().is_some() {
                tracing::debug!("Signing provider released");
            }
            return None;
        };

        if let Some((generation, provider)) = slot.as_ref() {
            if *generation == snapshot.generation {
                return Some(provider.clone());
            }
        }

        let provider = self.factory.create(credentials);
        tracing::debug!(
            base_address = %self.base_address,
            generation = snapshot.generation,
            rebuilt = slot.is_some(),
            "Signing provider built"
        );
        *slot = Some((snapshot.generation, provider.clone()));

        Some(provider)
    }

    pub fn provider_state(&self) -> ProviderState {
        let slot = self.provider.lock();
        match slot.as_ref() {
            None => ProviderState::Uninitialized,
            Some((generation, _)) if *generation == self.store.generation() => ProviderState::Ready,
            Some(_) if self.store.is_empty() => ProviderState::Uninitialized,
            Some(_) => ProviderState::Stale,
        }
    }

    /// Sign according to the request's placement policy.
    pub fn authenticate(&self, request: UnsignedRequest) -> Result<SignedRequest, SigningError> {
        self.sign_with_provider(request, |provider, request| provider.authenticate(request))
    }

    /// Sign the request into headers.
    pub fn sign_headers(&self, request: UnsignedRequest) -> Result<SignedRequest, SigningError> {
        self.sign_with_provider(request, |provider, request| provider.sign_headers(request))
    }

    /// Sign the request into its parameters.
    pub fn sign_parameters(&self, request: UnsignedRequest) -> Result<SignedRequest, SigningError> {
        self.sign_with_provider(request, |provider, request| {
            provider.sign_parameters(request)
        })
    }

    fn sign_with_provider<F>(
        &self,
        mut request: UnsignedRequest,
        sign: F,
    ) -> Result<SignedRequest, SigningError>
    where
        F: Fn(&dyn AuthenticationProvider, &UnsignedRequest) -> Result<SignedRequest, SigningError>,
    {
        if request.requires_auth && request.timestamp_ms.is_none() {
            request.timestamp_ms = Some(self.clock.now_ms());
        }

        loop {
            let generation = self.store.generation();

            let Some(provider) = self.authentication_provider() else {
                if request.requires_auth {
                    return Err(SigningError::MissingCredentials);
                }
                return Ok(canonical::assemble(
                    &request,
                    &request.parameters.ordered(request.order),
                    BTreeMap::new(),
                ));
            };

            match sign(provider.as_ref(), &request) {
                // Rotated between fetching the provider and exposing its
                // credentials: sign with the credentials that replaced them.
                Err(SigningError::MissingCredentials) if self.store.generation() != generation => {
                    tracing::debug!("Credentials rotated during signing, retrying with new provider");
                }
                result => return result,
            }
        }
    }

    /// Clear the credentials and drop the provider. Safe to call repeatedly.
    pub fn dispose(&self) {
        self.store.dispose();
        self.provider.lock().take();
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_address", &self.base_address)
            .field("store", &self.store)
            .field("provider_state", &self.provider_state())
            .finish()
    }
}
