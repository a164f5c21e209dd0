//! Policy integrity hash
//!
//! The hash covers the whole policy with `security.signature` removed,
//! serialized in a canonical compact form: object keys sorted, strings
//! escaped HTML-safe, numbers in shortest float64 form. Must stay
//! byte-identical to the encoding the policy's other readers hash.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::policy::PolicyDocument;
use crate::types::{PolicyError, PolicyResult};

/// Signature value present in unsigned policies
pub const PLACEHOLDER_SIGNATURE: &str = "REPLACE_WITH_SHA256_OR_SIGNATURE";

/// Result of checking a policy's signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// No real signature yet
    Placeholder { calculated: String },
    Valid {
        algorithm: String,
        hash: String,
        enforce_hash: bool,
    },
    Mismatch {
        expected: String,
        calculated: String,
    },
}

impl Verification {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Verification::Mismatch { .. })
    }
}

/// Hex SHA-256 of the canonical policy with its signature removed
pub fn policy_hash(doc: &PolicyDocument) -> PolicyResult<String> {
    let mut root = doc.as_value().clone();
    let security = root
        .get_mut("security")
        .and_then(Value::as_object_mut)
        .ok_or(PolicyError::MissingSecuritySection)?;
    security.remove("signature");

    let canonical = canonical_json(&root);
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

/// Compare the stored signature against the computed hash
pub fn verify(doc: &PolicyDocument) -> PolicyResult<Verification> {
    let calculated = policy_hash(doc)?;
    // policy_hash already checked the section exists
    let security = &doc.as_value()["security"];
    let field = |key: &str| security.get(key).and_then(Value::as_str).unwrap_or("");

    let signature = field("signature");
    if signature.is_empty() || signature == PLACEHOLDER_SIGNATURE {
        return Ok(Verification::Placeholder { calculated });
    }

    if signature != calculated {
        return Ok(Verification::Mismatch {
            expected: signature.to_string(),
            calculated,
        });
    }

    Ok(Verification::Valid {
        algorithm: field("signature_alg").to_string(),
        hash: calculated,
        enforce_hash: security
            .get("enforce_hash")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// Canonical compact serialization
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&format_number(n.as_f64().unwrap_or(0.0))),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '<' | '>' | '&' | '\u{2028}' | '\u{2029}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Shortest float64 form: plain decimal inside [1e-6, 1e21), exponent outside
fn format_number(f: f64) -> String {
    if !f.is_finite() {
        return "null".to_string();
    }
    let abs = f.abs();
    if abs == 0.0 || (1e-6..1e21).contains(&abs) {
        // Display never uses an exponent and drops a zero fraction
        return format!("{}", f);
    }

    let formatted = format!("{:e}", f);
    match formatted.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signed(signature: &str) -> Value {
        json!({
            "policy_id": "swing",
            "security": {
                "signature_alg": "sha256",
                "signature": signature,
                "enforce_hash": true,
                "on_hash_mismatch": "warn"
            },
            "sectors": [{"name": "Tech", "heat_cap_percent": 1.5}]
        })
    }

    #[test]
    fn test_canonical_sorts_keys() {
        assert_eq!(
            canonical_json(&json!({"b": 1, "a": [true, null], "c": {"z": "", "y": 2}})),
            r#"{"a":[true,null],"b":1,"c":{"y":2,"z":""}}"#
        );
    }

    #[test]
    fn test_canonical_escapes_html() {
        assert_eq!(
            canonical_json(&json!("f=a&ft=4 <b>")),
            r#""f=a\u0026ft=4 \u003cb\u003e""#
        );
        assert_eq!(canonical_json(&json!("é\n\u{1}")), "\"é\\n\\u0001\"");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.02), "0.02");
        assert_eq!(format_number(-3.5), "-3.5");
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e22), "1.5e+22");
    }

    #[test]
    fn test_hash_ignores_signature() {
        let a = PolicyDocument::from_value(signed("one"));
        let b = PolicyDocument::from_value(signed("two"));
        assert_eq!(policy_hash(&a).unwrap(), policy_hash(&b).unwrap());
        assert_eq!(policy_hash(&a).unwrap().len(), 64);
    }

    #[test]
    fn test_hash_matches_sha256_of_canonical() {
        let doc = PolicyDocument::from_value(json!({"security": {"signature": "x"}, "a": 1}));
        let expected = hex::encode(Sha256::digest(br#"{"a":1,"security":{}}"#));
        assert_eq!(policy_hash(&doc).unwrap(), expected);
    }

    #[test]
    fn test_verify_placeholder() {
        for sig in [PLACEHOLDER_SIGNATURE, ""] {
            let doc = PolicyDocument::from_value(signed(sig));
            assert!(matches!(
                verify(&doc).unwrap(),
                Verification::Placeholder { .. }
            ));
        }
    }

    #[test]
    fn test_verify_valid_and_mismatch() {
        let hash = policy_hash(&PolicyDocument::from_value(signed(""))).unwrap();

        let valid = verify(&PolicyDocument::from_value(signed(&hash))).unwrap();
        assert_eq!(
            valid,
            Verification::Valid {
                algorithm: "sha256".to_string(),
                hash: hash.clone(),
                enforce_hash: true,
            }
        );

        let wrong = verify(&PolicyDocument::from_value(signed("deadbeef"))).unwrap();
        assert!(wrong.is_mismatch());
    }

    #[test]
    fn test_missing_security_section() {
        let doc = PolicyDocument::from_value(json!({"sectors": []}));
        assert!(matches!(
            policy_hash(&doc),
            Err(PolicyError::MissingSecuritySection)
        ));
    }
}
