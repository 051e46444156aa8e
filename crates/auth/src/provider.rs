//! The signing provider contract shared by every exchange client.
//!
//! A provider turns an [`UnsignedRequest`] into a [`SignedRequest`], either by
//! producing authentication headers or by merging the same material into the
//! parameter set. Only [`AuthenticationProvider::sign_with`] is
//! exchange-specific; canonicalization and placement are provided.

use crate::canonical;
use crate::clock::local_time_ms;
use crate::credentials::{ApiCredentials, ExposedCredentials};
use crate::error::SigningError;
use crate::request::{
    ArraySerialization, AuthPlacement, ParamValue, SignedRequest, UnsignedRequest,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Names under which authentication material is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFieldNames {
    pub api_key: &'static str,
    pub signature: &'static str,
    pub timestamp: &'static str,
    pub passphrase: &'static str,
}

impl AuthFieldNames {
    /// Default header names.
    pub const HEADERS: Self = Self {
        api_key: "api-key",
        signature: "signature",
        timestamp: "timestamp",
        passphrase: "passphrase",
    };

    /// Default parameter names.
    pub const PARAMETERS: Self = Self {
        api_key: "apiKey",
        signature: "signature",
        timestamp: "timestamp",
        passphrase: "passphrase",
    };
}

/// A pluggable request-signing strategy.
///
/// Implementations hold a shared reference to the credentials they were built
/// from and must not copy the secret anywhere else. Once those credentials are
/// disposed (rotation or client teardown), every signing call fails with
/// [`SigningError::MissingCredentials`].
pub trait AuthenticationProvider: Send + Sync {
    /// Credentials this provider was built from.
    fn credentials(&self) -> &ApiCredentials;

    /// Compute the signature of an already-canonicalized payload.
    fn sign_with(
        &self,
        credentials: &ExposedCredentials<'_>,
        payload: &str,
    ) -> Result<String, SigningError>;

    fn header_names(&self) -> AuthFieldNames {
        AuthFieldNames::HEADERS
    }

    fn parameter_names(&self) -> AuthFieldNames {
        AuthFieldNames::PARAMETERS
    }

    /// Whether the strategy can sign requests using this array policy.
    fn supports_serialization(&self, _policy: ArraySerialization) -> bool {
        true
    }

    /// Sign a raw payload with the current credentials.
    fn sign(&self, payload: &str) -> Result<String, SigningError> {
        let credentials = self
            .credentials()
            .expose()
            .ok_or(SigningError::MissingCredentials)?;
        self.sign_with(&credentials, payload)
    }

    /// Sign the request and return authentication headers.
    fn sign_headers(&self, request: &UnsignedRequest) -> Result<SignedRequest, SigningError> {
        check_serialization(self, request)?;
        let parameters = request.parameters.ordered(request.order);

        if !request.requires_auth {
            return Ok(canonical::assemble(request, &parameters, BTreeMap::new()));
        }

        // Held until the signature is computed so disposal cannot interleave
        let credentials = self
            .credentials()
            .expose()
            .ok_or(SigningError::MissingCredentials)?;

        let timestamp = request.timestamp_ms.unwrap_or_else(local_time_ms);
        let base = canonical::header_signature_base(request, &parameters, timestamp);
        tracing::trace!(
            method = %request.method,
            uri = %request.uri,
            base_len = base.len(),
            "Signing request headers"
        );
        let signature = self.sign_with(&credentials, &base)?;

        let names = self.header_names();
        let mut headers = BTreeMap::new();
        headers.insert(names.api_key.to_string(), credentials.api_key().to_string());
        headers.insert(names.timestamp.to_string(), timestamp.to_string());
        headers.insert(names.signature.to_string(), signature);
        if let Some(passphrase) = credentials.passphrase() {
            headers.insert(names.passphrase.to_string(), passphrase.to_string());
        }

        Ok(canonical::assemble(request, &parameters, headers))
    }

    /// Sign the request and merge the authentication material into its parameters.
    ///
    /// The key and timestamp are added first and the set is put in the
    /// request's order; the resulting payload is signed, and the signature is
    /// appended last.
    fn sign_parameters(&self, request: &UnsignedRequest) -> Result<SignedRequest, SigningError> {
        check_serialization(self, request)?;
        let mut parameters = request.parameters.ordered(request.order);

        if !request.requires_auth {
            return Ok(canonical::assemble(request, &parameters, BTreeMap::new()));
        }

        let credentials = self
            .credentials()
            .expose()
            .ok_or(SigningError::MissingCredentials)?;

        let names = self.parameter_names();
        let timestamp = request.timestamp_ms.unwrap_or_else(local_time_ms);
        parameters.insert(names.api_key, credentials.api_key());
        parameters.insert(names.timestamp, timestamp);
        if let Some(passphrase) = credentials.passphrase() {
            parameters.insert(names.passphrase, passphrase);
        }
        let mut parameters = parameters.ordered(request.order);

        let base = canonical::payload(request, &parameters);
        tracing::trace!(
            method = %request.method,
            uri = %request.uri,
            base_len = base.len(),
            "Signing request parameters"
        );
        let signature = self.sign_with(&credentials, &base)?;
        parameters.insert(names.signature, ParamValue::Single(signature));

        Ok(canonical::assemble(request, &parameters, BTreeMap::new()))
    }

    /// Sign according to the request's placement policy.
    fn authenticate(&self, request: &UnsignedRequest) -> Result<SignedRequest, SigningError> {
        match request.placement {
            AuthPlacement::Headers => self.sign_headers(request),
            AuthPlacement::Parameters => self.sign_parameters(request),
        }
    }
}

fn check_serialization<P: AuthenticationProvider + ?Sized>(
    provider: &P,
    request: &UnsignedRequest,
) -> Result<(), SigningError> {
    if provider.supports_serialization(request.array_serialization) {
        Ok(())
    } else {
        Err(SigningError::UnsupportedSerialization(
            request.array_serialization.to_string(),
        ))
    }
}

/// Builds a provider from a credentials snapshot.
///
/// Implemented for any `Fn(Arc<ApiCredentials>) -> P`, so a provider
/// constructor such as `HmacProvider::new` can be passed directly.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, credentials: Arc<ApiCredentials>) -> Arc<dyn AuthenticationProvider>;
}

impl<F, P> ProviderFactory for F
where
    F: Fn(Arc<ApiCredentials>) -> P + Send + Sync,
    P: AuthenticationProvider + 'static,
{
    fn create(&self, credentials: Arc<ApiCredentials>) -> Arc<dyn AuthenticationProvider> {
        Arc::new(self(credentials))
    }
}
