//! Request descriptions passed between the transport and the signing layer.

use crate::error::SigningError;
use http::Method;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Where authentication material is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPlacement {
    /// Signature, key and timestamp travel as headers.
    #[default]
    Headers,
    /// Signature, key and timestamp are merged into the parameter set.
    Parameters,
}

/// Where request parameters travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterPosition {
    /// Parameters are encoded into the query string.
    #[default]
    InUri,
    /// Parameters are encoded into the request body.
    InBody,
}

impl ParameterPosition {
    /// Conventional position for a method: body for POST/PUT/PATCH, URI otherwise.
    pub fn for_method(method: &Method) -> Self {
        if *method == Method::POST || *method == Method::PUT || *method == Method::PATCH {
            Self::InBody
        } else {
            Self::InUri
        }
    }
}

/// Encoding of body-positioned parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    /// JSON object, multi-valued parameters as JSON arrays.
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` style `k=v&k=v`.
    FormData,
}

/// How a parameter with several values is flattened into key/value pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArraySerialization {
    /// `tags=a&tags=b`
    #[default]
    RepeatKey,
    /// `tags=a,b`
    CommaJoin,
    /// `tags[0]=a&tags[1]=b`
    IndexedKey,
    /// `tags[]=a&tags[]=b`
    Brackets,
}

impl ArraySerialization {
    /// Canonical name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepeatKey => "repeat-key",
            Self::CommaJoin => "comma-join",
            Self::IndexedKey => "indexed-key",
            Self::Brackets => "brackets",
        }
    }
}

impl fmt::Display for ArraySerialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArraySerialization {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "repeat-key" | "repeat" | "multiple-values" => Ok(Self::RepeatKey),
            "comma-join" | "comma" => Ok(Self::CommaJoin),
            "indexed-key" | "indexed" => Ok(Self::IndexedKey),
            "brackets" | "array" => Ok(Self::Brackets),
            _ => Err(SigningError::UnsupportedSerialization(s.to_string())),
        }
    }
}

/// Order in which parameters enter the signature base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterOrder {
    /// Keep the order parameters were added in.
    #[default]
    Insertion,
    /// Sort by key (stable, so repeated keys keep their relative order).
    Alphabetical,
}

/// A parameter value: a single string or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Single(value.to_string())
    }
}

impl<T: Into<String>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values.into_iter().map(Into::into).collect())
    }
}

/// Ordered parameter mapping. Keys are unique; re-inserting a key replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, ParamValue)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of the parameters in the requested order.
    pub fn ordered(&self, order: ParameterOrder) -> Self {
        let mut entries = self.0.clone();
        if order == ParameterOrder::Alphabetical {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
        }
        Self(entries)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// An outbound call before authentication.
#[derive(Debug, Clone)]
pub struct UnsignedRequest {
    /// Target URI: either a path (`/v1/balance`) or an absolute URL.
    pub uri: String,
    pub method: Method,
    pub parameters: Parameters,
    pub requires_auth: bool,
    pub placement: AuthPlacement,
    pub position: ParameterPosition,
    pub array_serialization: ArraySerialization,
    pub body_format: BodyFormat,
    pub order: ParameterOrder,
    /// Caller-supplied timestamp in milliseconds. When `None` the client's
    /// clock (or the system clock) fills it in.
    pub timestamp_ms: Option<i64>,
}

impl UnsignedRequest {
    /// Create an unauthenticated request with conventional defaults for `method`.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            position: ParameterPosition::for_method(&method),
            method,
            parameters: Parameters::new(),
            requires_auth: false,
            placement: AuthPlacement::default(),
            array_serialization: ArraySerialization::default(),
            body_format: BodyFormat::default(),
            order: ParameterOrder::default(),
            timestamp_ms: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key, value);
        self
    }

    /// Mark the request as requiring authentication.
    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn with_placement(mut self, placement: AuthPlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_position(mut self, position: ParameterPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_array_serialization(mut self, policy: ArraySerialization) -> Self {
        self.array_serialization = policy;
        self
    }

    pub fn with_body_format(mut self, format: BodyFormat) -> Self {
        self.body_format = format;
        self
    }

    pub fn with_order(mut self, order: ParameterOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Path component of the URI, used in the signature base.
    pub fn path(&self) -> String {
        match self.uri.parse::<http::Uri>() {
            Ok(uri) => uri.path().to_string(),
            Err(_) => self.uri.clone(),
        }
    }
}

/// An outbound call with authentication attached.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub uri: String,
    pub method: Method,
    /// Authentication headers (empty when authentication went into parameters).
    pub headers: BTreeMap<String, String>,
    /// Flattened parameters, including any authentication parameters.
    pub parameters: Vec<(String, String)>,
    /// Query string without the leading `?`. Empty for body-positioned requests.
    pub query: String,
    /// Request body for body-positioned requests with parameters.
    pub body: Option<String>,
}

impl SignedRequest {
    /// All values of a flattened parameter, in order.
    pub fn parameter_values(&self, key: &str) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Target including the query string, if any.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            self.uri.clone()
        } else {
            format!("{}?{}", self.uri, self.query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_follows_method() {
        assert_eq!(UnsignedRequest::get("/a").position, ParameterPosition::InUri);
        assert_eq!(UnsignedRequest::delete("/a").position, ParameterPosition::InUri);
        assert_eq!(UnsignedRequest::post("/a").position, ParameterPosition::InBody);
        assert_eq!(
            UnsignedRequest::new(Method::PUT, "/a").position,
            ParameterPosition::InBody
        );
    }

    #[test]
    fn test_parameters_replace_in_place() {
        let mut params = Parameters::new();
        params.insert("b", "1");
        params.insert("a", "2");
        params.insert("b", "3");

        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(params.get("b"), Some(&ParamValue::Single("3".into())));
    }

    #[test]
    fn test_parameters_alphabetical_order() {
        let params: Parameters = [("zebra", "1"), ("alpha", "2"), ("middle", "3")]
            .into_iter()
            .collect();

        let keys: Vec<_> = params
            .ordered(ParameterOrder::Alphabetical)
            .iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(keys, vec!["alpha", "middle", "zebra"]);
    }

    #[test]
    fn test_parse_array_serialization() {
        assert_eq!(
            "comma-join".parse::<ArraySerialization>().unwrap(),
            ArraySerialization::CommaJoin
        );
        assert_eq!(
            "REPEAT-KEY".parse::<ArraySerialization>().unwrap(),
            ArraySerialization::RepeatKey
        );
        assert_eq!(
            "indexed".parse::<ArraySerialization>().unwrap(),
            ArraySerialization::IndexedKey
        );
        assert_eq!(
            "array".parse::<ArraySerialization>().unwrap(),
            ArraySerialization::Brackets
        );
    }

    #[test]
    fn test_parse_unknown_array_serialization() {
        let err = "semicolon".parse::<ArraySerialization>().unwrap_err();
        assert!(matches!(err, SigningError::UnsupportedSerialization(name) if name == "semicolon"));
    }

    #[test]
    fn test_path_from_absolute_uri() {
        let request = UnsignedRequest::get("https://api.example.com/v1/balance?x=1");
        assert_eq!(request.path(), "/v1/balance");
        assert_eq!(UnsignedRequest::get("/v1/balance").path(), "/v1/balance");
    }

    #[test]
    fn test_signed_request_url() {
        let signed = SignedRequest {
            uri: "/v1/order".into(),
            method: Method::GET,
            headers: BTreeMap::new(),
            parameters: vec![("symbol".into(), "BTCUSDT".into())],
            query: "symbol=BTCUSDT".into(),
            body: None,
        };
        assert_eq!(signed.url(), "/v1/order?symbol=BTCUSDT");
        assert_eq!(signed.parameter_values("symbol"), vec!["BTCUSDT"]);
    }
}
