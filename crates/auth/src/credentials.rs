//! Secure API credential management.
//!
//! Key, secret and passphrase are wrapped in `SecretString`, so they never
//! show up in `Debug` output and are zeroed when dropped. The material sits
//! behind a lock so it can be cleared in place while other holders still
//! reference the same `ApiCredentials`.

use crate::error::CredentialsError;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use secrecy::{ExposeSecret, SecretString};
use std::io::Read;
use zeroize::Zeroizing;

/// Default JSON field holding the API key.
pub const DEFAULT_KEY_FIELD: &str = "apiKey";
/// Default JSON field holding the API secret.
pub const DEFAULT_SECRET_FIELD: &str = "apiSecret";
/// JSON field holding the optional passphrase.
pub const PASSPHRASE_FIELD: &str = "passphrase";

struct CredentialMaterial {
    api_key: SecretString,
    secret_key: SecretString,
    passphrase: Option<SecretString>,
}

/// API credentials for authenticated requests.
///
/// Every holder owns its own buffers: use [`ApiCredentials::copy`] rather than
/// sharing one instance between clients.
pub struct ApiCredentials {
    material: RwLock<Option<CredentialMaterial>>,
}

impl ApiCredentials {
    /// Create credentials from a key and secret.
    ///
    /// # Errors
    /// Returns `CredentialsError::InvalidCredentials` if either half is empty
    /// or the key contains whitespace.
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        Self::build(
            Zeroizing::new(api_key.into()),
            Zeroizing::new(secret_key.into()),
            None,
        )
    }

    /// Create credentials that also carry a passphrase (OKX, KuCoin style).
    pub fn with_passphrase(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        Self::build(
            Zeroizing::new(api_key.into()),
            Zeroizing::new(secret_key.into()),
            Some(Zeroizing::new(passphrase.into())),
        )
    }

    /// Input buffers are zeroed on drop, whether or not validation passes.
    fn build(
        api_key: Zeroizing<String>,
        secret_key: Zeroizing<String>,
        passphrase: Option<Zeroizing<String>>,
    ) -> Result<Self, CredentialsError> {
        match (api_key.is_empty(), secret_key.is_empty()) {
            (true, true) => {
                return Err(CredentialsError::InvalidCredentials(
                    "API key and secret are both empty".into(),
                ))
            }
            (true, false) => {
                return Err(CredentialsError::InvalidCredentials(
                    "API key is empty but a secret was provided".into(),
                ))
            }
            (false, true) => {
                return Err(CredentialsError::InvalidCredentials(
                    "API secret is empty but a key was provided".into(),
                ))
            }
            (false, false) => {}
        }

        if api_key.chars().any(char::is_whitespace) {
            return Err(CredentialsError::InvalidCredentials(
                "API key contains whitespace".into(),
            ));
        }

        if passphrase.as_ref().is_some_and(|p| p.is_empty()) {
            return Err(CredentialsError::InvalidCredentials(
                "passphrase is empty".into(),
            ));
        }

        Ok(Self {
            material: RwLock::new(Some(CredentialMaterial {
                api_key: seal(&api_key),
                secret_key: seal(&secret_key),
                passphrase: passphrase.as_deref().map(|p| seal(p)),
            })),
        })
    }

    /// Load credentials from environment variables.
    ///
    /// Looks for:
    /// - `{PREFIX}_API_KEY` - The API key
    /// - `{PREFIX}_API_SECRET` - The secret key
    /// - `{PREFIX}_API_PASSPHRASE` - Optional passphrase
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// # Errors
    /// Returns `CredentialsError::MissingEnvVar` if key or secret is not set.
    pub fn from_env(prefix: &str) -> Result<Self, CredentialsError> {
        // Load .env file if present (ignores errors if file doesn't exist)
        dotenvy::dotenv().ok();

        let key_var = format!("{prefix}_API_KEY");
        let secret_var = format!("{prefix}_API_SECRET");
        let passphrase_var = format!("{prefix}_API_PASSPHRASE");

        let api_key = std::env::var(&key_var)
            .map(Zeroizing::new)
            .map_err(|_| CredentialsError::MissingEnvVar(key_var))?;
        let secret_key = std::env::var(&secret_var)
            .map(Zeroizing::new)
            .map_err(|_| CredentialsError::MissingEnvVar(secret_var))?;
        let passphrase = std::env::var(&passphrase_var).ok().map(Zeroizing::new);

        Self::build(api_key, secret_key, passphrase)
    }

    /// Read credentials from a JSON document.
    ///
    /// `key_field` and `secret_field` default to `apiKey` and `apiSecret`.
    /// A `passphrase` field is picked up when present.
    pub fn from_json_reader<R: Read>(
        reader: R,
        key_field: Option<&str>,
        secret_field: Option<&str>,
    ) -> Result<Self, CredentialsError> {
        let mut document: serde_json::Map<String, serde_json::Value> =
            serde_json::from_reader(reader)?;

        let mut take = |field: &str| match document.remove(field) {
            Some(serde_json::Value::String(value)) => Ok(Some(Zeroizing::new(value))),
            Some(_) => Err(CredentialsError::InvalidCredentials(format!(
                "field '{field}' is not a string"
            ))),
            None => Ok(None),
        };

        let key_field = key_field.unwrap_or(DEFAULT_KEY_FIELD);
        let secret_field = secret_field.unwrap_or(DEFAULT_SECRET_FIELD);

        let api_key = take(key_field)?
            .ok_or_else(|| CredentialsError::MissingField(key_field.to_string()))?;
        let secret_key = take(secret_field)?
            .ok_or_else(|| CredentialsError::MissingField(secret_field.to_string()))?;
        let passphrase = take(PASSPHRASE_FIELD)?;

        Self::build(api_key, secret_key, passphrase)
    }

    /// Produce an independent copy with its own secret buffers.
    ///
    /// Returns `None` if these credentials were already disposed.
    pub fn copy(&self) -> Option<Self> {
        let exposed = self.expose()?;
        let material = CredentialMaterial {
            api_key: seal(exposed.api_key()),
            secret_key: seal(exposed.expose_secret()),
            passphrase: exposed.passphrase().map(seal),
        };

        Some(Self {
            material: RwLock::new(Some(material)),
        })
    }

    /// Borrow the credential material for one signing operation.
    ///
    /// The returned guard pins the material: `dispose` blocks until every
    /// outstanding guard is dropped. Do not hold it across requests.
    pub fn expose(&self) -> Option<ExposedCredentials<'_>> {
        RwLockReadGuard::try_map(self.material.read(), Option::as_ref)
            .ok()
            .map(|guard| ExposedCredentials { guard })
    }

    /// Returns true once the secret material has been cleared.
    pub fn is_disposed(&self) -> bool {
        self.material.read().is_none()
    }

    /// Clear the secret material.
    ///
    /// Waits for in-flight signing operations to release their guard, then
    /// drops (and thereby zeroes) the buffers. Calling it again is a no-op.
    pub fn dispose(&self) {
        let cleared = self.material.write().take();
        if cleared.is_some() {
            tracing::debug!("API credentials disposed");
        }
    }
}

/// Copy secret text into an exactly sized buffer owned by `SecretString`.
fn seal(value: &str) -> SecretString {
    SecretString::new(Box::from(value))
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let material = self.material.read();
        f.debug_struct("ApiCredentials")
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field(
                "has_passphrase",
                &material.as_ref().is_some_and(|m| m.passphrase.is_some()),
            )
            .field("disposed", &material.is_none())
            .finish()
    }
}

/// Read access to credential material, held for the duration of one operation.
pub struct ExposedCredentials<'a> {
    guard: MappedRwLockReadGuard<'a, CredentialMaterial>,
}

impl ExposedCredentials<'_> {
    /// The API key identifier.
    pub fn api_key(&self) -> &str {
        self.guard.api_key.expose_secret()
    }

    /// Expose the secret key for signing.
    ///
    /// **WARNING**: Only use this for cryptographic operations.
    /// Never log or display the return value.
    pub fn expose_secret(&self) -> &str {
        self.guard.secret_key.expose_secret()
    }

    /// The passphrase, if the exchange issued one.
    pub fn passphrase(&self) -> Option<&str> {
        self.guard.passphrase.as_ref().map(|p| p.expose_secret())
    }
}

impl std::fmt::Debug for ExposedCredentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExposedCredentials([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = ApiCredentials::new("my_api_key", "my_secret").unwrap();
        let exposed = creds.expose().unwrap();
        assert_eq!(exposed.api_key(), "my_api_key");
        assert_eq!(exposed.expose_secret(), "my_secret");
        assert_eq!(exposed.passphrase(), None);
    }

    #[test]
    fn test_credentials_with_passphrase() {
        let creds = ApiCredentials::with_passphrase("key", "secret", "phrase").unwrap();
        assert_eq!(creds.expose().unwrap().passphrase(), Some("phrase"));
    }

    #[test]
    fn test_rejects_empty_key_with_secret() {
        let err = ApiCredentials::new("", "secret").unwrap_err();
        assert!(matches!(err, CredentialsError::InvalidCredentials(_)));
    }

    #[test]
    fn test_rejects_malformed_combinations() {
        assert!(ApiCredentials::new("key", "").is_err());
        assert!(ApiCredentials::new("", "").is_err());
        assert!(ApiCredentials::new("my key", "secret").is_err());
        assert!(ApiCredentials::with_passphrase("key", "secret", "").is_err());
    }

    #[test]
    fn test_secret_from_oversized_buffer() {
        let mut secret = String::with_capacity(256);
        secret.push_str("secret");

        let creds = ApiCredentials::new("key", secret).unwrap();
        let exposed = creds.expose().unwrap();
        assert_eq!(exposed.expose_secret(), "secret");
        assert_eq!(exposed.expose_secret().len(), 6);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = ApiCredentials::new("my_api_key", "super_secret_key").unwrap();
        let debug_str = format!("{:?}", creds);

        assert!(!debug_str.contains("my_api_key"));
        assert!(!debug_str.contains("super_secret_key"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_dispose_clears_and_is_idempotent() {
        let creds = ApiCredentials::new("key", "secret").unwrap();
        assert!(!creds.is_disposed());

        creds.dispose();
        assert!(creds.is_disposed());
        assert!(creds.expose().is_none());

        creds.dispose();
        assert!(creds.is_disposed());
    }

    #[test]
    fn test_dispose_waits_for_exposed_guard() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::Duration;

        let creds = ApiCredentials::new("key", "secret").unwrap();
        let disposed = AtomicBool::new(false);
        let exposed = creds.expose().unwrap();

        std::thread::scope(|s| {
            let handle = s.spawn(|| {
                creds.dispose();
                disposed.store(true, Ordering::SeqCst);
            });

            std::thread::sleep(Duration::from_millis(50));
            assert!(!disposed.load(Ordering::SeqCst));
            assert_eq!(exposed.expose_secret(), "secret");

            drop(exposed);
            handle.join().unwrap();
        });

        assert!(disposed.load(Ordering::SeqCst));
        assert!(creds.is_disposed());
    }

    #[test]
    fn test_copy_is_independent() {
        let original = ApiCredentials::with_passphrase("key", "secret", "phrase").unwrap();
        let copy = original.copy().unwrap();

        original.dispose();

        let exposed = copy.expose().unwrap();
        assert_eq!(exposed.api_key(), "key");
        assert_eq!(exposed.expose_secret(), "secret");
        assert_eq!(exposed.passphrase(), Some("phrase"));
        assert!(original.copy().is_none());
    }

    #[test]
    fn test_from_json_default_fields() {
        let json = br#"{"apiKey": "k1", "apiSecret": "s1", "passphrase": "p1"}"#;
        let creds = ApiCredentials::from_json_reader(&json[..], None, None).unwrap();
        let exposed = creds.expose().unwrap();
        assert_eq!(exposed.api_key(), "k1");
        assert_eq!(exposed.expose_secret(), "s1");
        assert_eq!(exposed.passphrase(), Some("p1"));
    }

    #[test]
    fn test_from_json_custom_fields() {
        let json = br#"{"key": "k2", "secret": "s2"}"#;
        let creds = ApiCredentials::from_json_reader(&json[..], Some("key"), Some("secret")).unwrap();
        assert_eq!(creds.expose().unwrap().api_key(), "k2");
    }

    #[test]
    fn test_from_json_missing_field() {
        let json = br#"{"apiKey": "k"}"#;
        let err = ApiCredentials::from_json_reader(&json[..], None, None).unwrap_err();
        assert!(matches!(err, CredentialsError::MissingField(field) if field == "apiSecret"));
    }

    #[test]
    fn test_from_json_non_string_field() {
        let json = br#"{"apiKey": 42, "apiSecret": "s"}"#;
        let err = ApiCredentials::from_json_reader(&json[..], None, None).unwrap_err();
        assert!(matches!(err, CredentialsError::InvalidCredentials(_)));
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("AUTHTEST_API_KEY", Some("env_key")),
                ("AUTHTEST_API_SECRET", Some("env_secret")),
                ("AUTHTEST_API_PASSPHRASE", None),
            ],
            || {
                let creds = ApiCredentials::from_env("AUTHTEST").unwrap();
                let exposed = creds.expose().unwrap();
                assert_eq!(exposed.api_key(), "env_key");
                assert_eq!(exposed.expose_secret(), "env_secret");
                assert_eq!(exposed.passphrase(), None);
            },
        );
    }

    #[test]
    fn test_from_env_missing_secret() {
        temp_env::with_vars(
            [
                ("AUTHMISSING_API_KEY", Some("env_key")),
                ("AUTHMISSING_API_SECRET", None),
            ],
            || {
                let err = ApiCredentials::from_env("AUTHMISSING").unwrap_err();
                assert!(
                    matches!(err, CredentialsError::MissingEnvVar(name) if name == "AUTHMISSING_API_SECRET")
                );
            },
        );
    }
}
