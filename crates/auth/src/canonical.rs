//! Deterministic serialization of request parameters and signature bases.

use crate::request::{
    ArraySerialization, BodyFormat, ParamValue, ParameterPosition, Parameters, SignedRequest,
    UnsignedRequest,
};
use std::collections::BTreeMap;

/// Flatten parameters into key/value pairs using the array policy.
///
/// Array elements keep the order they appear in.
pub fn flatten(parameters: &Parameters, policy: ArraySerialization) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(parameters.len());

    for (key, value) in parameters.iter() {
        match value {
            ParamValue::Single(v) => pairs.push((key.to_string(), v.clone())),
            ParamValue::Many(values) => match policy {
                ArraySerialization::CommaJoin => {
                    pairs.push((key.to_string(), values.join(",")));
                }
                ArraySerialization::RepeatKey => {
                    pairs.extend(values.iter().map(|v| (key.to_string(), v.clone())));
                }
                ArraySerialization::IndexedKey => {
                    pairs.extend(
                        values
                            .iter()
                            .enumerate()
                            .map(|(i, v)| (format!("{key}[{i}]"), v.clone())),
                    );
                }
                ArraySerialization::Brackets => {
                    pairs.extend(values.iter().map(|v| (format!("{key}[]"), v.clone())));
                }
            },
        }
    }

    pairs
}

/// Join pairs as `k=v&k=v`. Values are not percent-encoded; the signature
/// must cover exactly what the exchange reconstructs.
pub fn to_query_string(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Serialize parameters as a JSON object, preserving their order.
pub fn to_json_body(parameters: &Parameters) -> String {
    let object: serde_json::Map<String, serde_json::Value> = parameters
        .iter()
        .map(|(key, value)| {
            let json = match value {
                ParamValue::Single(v) => serde_json::Value::String(v.clone()),
                ParamValue::Many(values) => serde_json::Value::Array(
                    values
                        .iter()
                        .map(|v| serde_json::Value::String(v.clone()))
                        .collect(),
                ),
            };
            (key.to_string(), json)
        })
        .collect();

    serde_json::Value::Object(object).to_string()
}

/// The exact parameter payload the transport will send: the query string for
/// URI-positioned requests, the body otherwise.
pub fn payload(request: &UnsignedRequest, parameters: &Parameters) -> String {
    match (request.position, request.body_format) {
        (ParameterPosition::InBody, BodyFormat::Json) => {
            if parameters.is_empty() {
                String::new()
            } else {
                to_json_body(parameters)
            }
        }
        _ => to_query_string(&flatten(parameters, request.array_serialization)),
    }
}

/// Signature base for header authentication:
/// `timestamp + METHOD + path` followed by `?query` or the body.
pub fn header_signature_base(
    request: &UnsignedRequest,
    parameters: &Parameters,
    timestamp_ms: i64,
) -> String {
    let payload = payload(request, parameters);
    let mut base = format!("{}{}{}", timestamp_ms, request.method.as_str(), request.path());

    if !payload.is_empty() {
        if request.position == ParameterPosition::InUri {
            base.push('?');
        }
        base.push_str(&payload);
    }

    base
}

/// Build the signed request the transport consumes.
pub fn assemble(
    request: &UnsignedRequest,
    parameters: &Parameters,
    headers: BTreeMap<String, String>,
) -> SignedRequest {
    let flat = flatten(parameters, request.array_serialization);

    let (query, body) = match request.position {
        ParameterPosition::InUri => (to_query_string(&flat), None),
        ParameterPosition::InBody if parameters.is_empty() => (String::new(), None),
        ParameterPosition::InBody => (String::new(), Some(payload(request, parameters))),
    };

    SignedRequest {
        uri: request.uri.clone(),
        method: request.method.clone(),
        headers,
        parameters: flat,
        query,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ParameterOrder;

    fn tags() -> Parameters {
        [("tags", vec!["a", "b"])].into_iter().collect()
    }

    #[test]
    fn test_flatten_repeat_key() {
        let pairs = flatten(&tags(), ArraySerialization::RepeatKey);
        assert_eq!(
            pairs,
            vec![("tags".into(), "a".into()), ("tags".into(), "b".into())]
        );
    }

    #[test]
    fn test_flatten_comma_join() {
        let pairs = flatten(&tags(), ArraySerialization::CommaJoin);
        assert_eq!(pairs, vec![("tags".into(), "a,b".into())]);
    }

    #[test]
    fn test_flatten_indexed_and_brackets() {
        let indexed = to_query_string(&flatten(&tags(), ArraySerialization::IndexedKey));
        assert_eq!(indexed, "tags[0]=a&tags[1]=b");

        let brackets = to_query_string(&flatten(&tags(), ArraySerialization::Brackets));
        assert_eq!(brackets, "tags[]=a&tags[]=b");
    }

    #[test]
    fn test_json_body_preserves_order() {
        let params: Parameters = [
            ("zebra", ParamValue::from("1")),
            ("alpha", ParamValue::from(vec!["x", "y"])),
        ]
        .into_iter()
        .collect();

        assert_eq!(to_json_body(&params), r#"{"zebra":"1","alpha":["x","y"]}"#);
    }

    #[test]
    fn test_header_base_with_query() {
        let request = UnsignedRequest::get("/api/v1/order")
            .param("symbol", "BTCUSDT")
            .param("limit", 5i64);
        let base = header_signature_base(&request, &request.parameters, 1000);
        assert_eq!(base, "1000GET/api/v1/order?symbol=BTCUSDT&limit=5");
    }

    #[test]
    fn test_header_base_with_json_body() {
        let request = UnsignedRequest::post("/api/v1/order").param("symbol", "BTCUSDT");
        let base = header_signature_base(&request, &request.parameters, 1000);
        assert_eq!(base, r#"1000POST/api/v1/order{"symbol":"BTCUSDT"}"#);
    }

    #[test]
    fn test_header_base_without_parameters() {
        let request = UnsignedRequest::post("/api/v1/cancelAll");
        assert_eq!(
            header_signature_base(&request, &request.parameters, 7),
            "7POST/api/v1/cancelAll"
        );
    }

    #[test]
    fn test_assemble_form_body() {
        let request = UnsignedRequest::post("/order")
            .with_body_format(BodyFormat::FormData)
            .param("zebra", "1")
            .param("alpha", "2")
            .with_order(ParameterOrder::Alphabetical);
        let params = request.parameters.ordered(request.order);

        let signed = assemble(&request, &params, BTreeMap::new());
        assert_eq!(signed.query, "");
        assert_eq!(signed.body.as_deref(), Some("alpha=2&zebra=1"));
    }
}
