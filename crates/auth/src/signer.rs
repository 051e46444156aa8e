//! HMAC request signing (SHA-256 / SHA-512).

use crate::credentials::{ApiCredentials, ExposedCredentials};
use crate::error::SigningError;
use crate::provider::{AuthFieldNames, AuthenticationProvider};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Hash function used inside the HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HmacAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

/// Text encoding of the raw MAC bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureEncoding {
    /// Lowercase hex (Binance, Bybit).
    #[default]
    HexLower,
    /// Uppercase hex.
    HexUpper,
    /// Standard base64 (OKX, Coinbase, Kraken).
    Base64,
}

impl SignatureEncoding {
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            Self::HexLower => hex::encode(bytes),
            Self::HexUpper => hex::encode_upper(bytes),
            Self::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// HMAC signing provider keyed with the API secret.
pub struct HmacProvider {
    credentials: Arc<ApiCredentials>,
    algorithm: HmacAlgorithm,
    encoding: SignatureEncoding,
    header_names: AuthFieldNames,
    parameter_names: AuthFieldNames,
}

impl HmacProvider {
    /// HMAC-SHA256 with lowercase hex output.
    pub fn new(credentials: Arc<ApiCredentials>) -> Self {
        Self {
            credentials,
            algorithm: HmacAlgorithm::default(),
            encoding: SignatureEncoding::default(),
            header_names: AuthFieldNames::HEADERS,
            parameter_names: AuthFieldNames::PARAMETERS,
        }
    }

    pub fn with_algorithm(mut self, algorithm: HmacAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_encoding(mut self, encoding: SignatureEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_header_names(mut self, names: AuthFieldNames) -> Self {
        self.header_names = names;
        self
    }

    pub fn with_parameter_names(mut self, names: AuthFieldNames) -> Self {
        self.parameter_names = names;
        self
    }

    fn mac(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, SigningError> {
        let bytes = match self.algorithm {
            HmacAlgorithm::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|e| SigningError::AlgorithmFailure(e.to_string()))?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            HmacAlgorithm::Sha512 => {
                let mut mac = HmacSha512::new_from_slice(key)
                    .map_err(|e| SigningError::AlgorithmFailure(e.to_string()))?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(bytes)
    }
}

impl AuthenticationProvider for HmacProvider {
    fn credentials(&self) -> &ApiCredentials {
        &self.credentials
    }

    fn sign_with(
        &self,
        credentials: &ExposedCredentials<'_>,
        payload: &str,
    ) -> Result<String, SigningError> {
        let mac = self.mac(credentials.expose_secret().as_bytes(), payload.as_bytes())?;
        Ok(self.encoding.encode(&mac))
    }

    fn header_names(&self) -> AuthFieldNames {
        self.header_names
    }

    fn parameter_names(&self) -> AuthFieldNames {
        self.parameter_names
    }
}

impl std::fmt::Debug for HmacProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacProvider")
            .field("algorithm", &self.algorithm)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{AuthPlacement, UnsignedRequest};

    const BINANCE_KEY: &str = "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A";
    const BINANCE_SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";

    fn binance_provider() -> HmacProvider {
        let creds = ApiCredentials::new(BINANCE_KEY, BINANCE_SECRET).unwrap();
        HmacProvider::new(Arc::new(creds))
    }

    #[test]
    fn test_sign_known_vector() {
        // Test vector from Binance API documentation
        // https://binance-docs.github.io/apidocs/spot/en/#signed-trade-and-user_data-endpoint-security
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        let signature = binance_provider().sign(query).unwrap();

        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_binance_style_parameters() {
        let names = AuthFieldNames {
            api_key: "X-MBX-APIKEY",
            ..AuthFieldNames::PARAMETERS
        };
        let provider = binance_provider().with_parameter_names(names);

        // Binance takes the key as a header; a strategy that signs parameters
        // still merges key and timestamp before signing.
        let request = UnsignedRequest::get("/api/v3/order")
            .param("symbol", "LTCBTC")
            .with_placement(AuthPlacement::Parameters)
            .authenticated()
            .with_timestamp(1_499_827_319_559);

        let signed = provider.authenticate(&request).unwrap();
        let signature = signed.parameter_values("signature");
        assert_eq!(signature.len(), 1);
        assert_eq!(signature[0].len(), 64);
        assert_eq!(signed.parameter_values("X-MBX-APIKEY"), vec![BINANCE_KEY]);
    }

    #[test]
    fn test_encodings_differ_only_in_format() {
        let creds = Arc::new(ApiCredentials::new("key", "secret").unwrap());
        let lower = HmacProvider::new(creds.clone()).sign("message").unwrap();
        let upper = HmacProvider::new(creds.clone())
            .with_encoding(SignatureEncoding::HexUpper)
            .sign("message")
            .unwrap();
        let b64 = HmacProvider::new(creds)
            .with_encoding(SignatureEncoding::Base64)
            .sign("message")
            .unwrap();

        assert_eq!(lower.to_uppercase(), upper);
        assert_eq!(
            base64::engine::general_purpose::STANDARD.decode(b64).unwrap(),
            hex::decode(lower).unwrap()
        );
    }

    #[test]
    fn test_sha512_length() {
        let creds = Arc::new(ApiCredentials::new("key", "secret").unwrap());
        let signature = HmacProvider::new(creds)
            .with_algorithm(HmacAlgorithm::Sha512)
            .sign("message")
            .unwrap();
        assert_eq!(signature.len(), 128);
    }

    #[test]
    fn test_sign_empty_message() {
        // Should not panic on empty message
        let signature = binance_provider().sign("").unwrap();
        assert!(!signature.is_empty());
    }

    #[test]
    fn test_sign_headers_uses_custom_names() {
        let names = AuthFieldNames {
            api_key: "OK-ACCESS-KEY",
            signature: "OK-ACCESS-SIGN",
            timestamp: "OK-ACCESS-TIMESTAMP",
            passphrase: "OK-ACCESS-PASSPHRASE",
        };
        let creds = ApiCredentials::with_passphrase("key", "secret", "phrase").unwrap();
        let provider = HmacProvider::new(Arc::new(creds))
            .with_encoding(SignatureEncoding::Base64)
            .with_header_names(names);

        let request = UnsignedRequest::get("/api/v5/account/balance")
            .authenticated()
            .with_timestamp(1);
        let signed = provider.sign_headers(&request).unwrap();

        assert_eq!(signed.header("OK-ACCESS-KEY"), Some("key"));
        assert_eq!(signed.header("OK-ACCESS-PASSPHRASE"), Some("phrase"));
        assert_eq!(
            signed.header("OK-ACCESS-SIGN"),
            Some(provider.sign("1GET/api/v5/account/balance").unwrap().as_str())
        );
    }
}
