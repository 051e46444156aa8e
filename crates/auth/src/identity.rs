//! Pass-through strategy whose signature is the signature base itself.
//!
//! Handy in tests and when debugging canonicalization against exchange docs.

use crate::credentials::{ApiCredentials, ExposedCredentials};
use crate::error::SigningError;
use crate::provider::AuthenticationProvider;
use std::sync::Arc;

#[derive(Debug)]
pub struct IdentityProvider {
    credentials: Arc<ApiCredentials>,
}

impl IdentityProvider {
    pub fn new(credentials: Arc<ApiCredentials>) -> Self {
        Self { credentials }
    }
}

impl AuthenticationProvider for IdentityProvider {
    fn credentials(&self) -> &ApiCredentials {
        &self.credentials
    }

    fn sign_with(
        &self,
        _credentials: &ExposedCredentials<'_>,
        payload: &str,
    ) -> Result<String, SigningError> {
        Ok(payload.to_string())
    }
}
