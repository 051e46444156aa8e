//! Authentication and signing for exchange APIs.
//!
//! This crate decides how an outgoing request is proven authentic, where the
//! proof travels (headers or parameters), and how the secret material behind
//! it is owned and released.
//!
//! # Features
//!
//! - **Secure Credentials**: key, secret and passphrase are wrapped in
//!   `SecretString`, never printed, and cleared on rotation or disposal.
//! - **Pluggable Signing**: [`AuthenticationProvider`] handles canonicalization
//!   and placement; strategies only implement the signature primitive.
//! - **Lazy Providers**: [`ApiClient`] builds one provider per credentials
//!   generation, even under concurrent first use, and rebuilds after rotation.
//! - **HMAC Strategies**: HMAC-SHA256/SHA512 with hex or base64 output.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::{
//!     ApiClient, ApiClientOptions, AuthPlacement, ClientOptions, HmacProvider, UnsignedRequest,
//! };
//!
//! // Load credentials from environment
//! let options = ClientOptions::from_env("BINANCE")?;
//! let api = ApiClientOptions::new("https://api.binance.com");
//! let client = ApiClient::new(&options, &api, HmacProvider::new)?;
//!
//! // Sign an order query into its parameters
//! let request = UnsignedRequest::get("/api/v3/order")
//!     .param("symbol", "BTCUSDT")
//!     .with_placement(AuthPlacement::Parameters)
//!     .authenticated();
//! let signed = client.authenticate(request)?;
//! ```

pub mod canonical;
mod client;
mod clock;
mod credentials;
mod error;
mod identity;
mod provider;
mod request;
mod signer;
mod store;

pub use client::{ApiClient, ApiClientOptions, ClientOptions, ProviderState};
pub use clock::{local_time_ms, Clock, FixedClock, SystemClock};
pub use credentials::{
    ApiCredentials, ExposedCredentials, DEFAULT_KEY_FIELD, DEFAULT_SECRET_FIELD, PASSPHRASE_FIELD,
};
pub use error::{CredentialsError, SigningError};
pub use identity::IdentityProvider;
pub use provider::{AuthFieldNames, AuthenticationProvider, ProviderFactory};
pub use request::{
    ArraySerialization, AuthPlacement, BodyFormat, ParamValue, ParameterOrder, ParameterPosition,
    Parameters, SignedRequest, UnsignedRequest,
};
pub use signer::{HmacAlgorithm, HmacProvider, SignatureEncoding};
pub use store::{CredentialSnapshot, CredentialStore};

pub use http::Method;
