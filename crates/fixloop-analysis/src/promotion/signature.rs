//! Versioned, deterministic pattern signatures.
//!
//! The canonical input is `{pattern_type, keywords, pattern_indicators}`
//! with keywords truncated to the first 20, and both lists lowercased,
//! deduplicated and sorted. The digest is blake3 over its compact JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use fixloop_core::constants::{SIGNATURE_KEYWORD_LIMIT, SIGNATURE_VERSION};
use fixloop_core::errors::EventError;

/// Canonicalized inputs of a signature. Field order is the serialization
/// order and is part of the format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInputs {
    pub pattern_type: String,
    pub keywords: Vec<String>,
    pub pattern_indicators: Vec<String>,
}

impl SignatureInputs {
    pub fn canonicalize(pattern_type: &str, keywords: &[String], pattern_indicators: &[String]) -> Self {
        Self {
            pattern_type: pattern_type.trim().to_string(),
            keywords: normalize(keywords.iter().take(SIGNATURE_KEYWORD_LIMIT)),
            pattern_indicators: normalize(pattern_indicators.iter()),
        }
    }
}

fn normalize<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = items
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSignature {
    pub signature_version: String,
    pub digest: String,
    pub inputs: SignatureInputs,
}

impl PatternSignature {
    pub fn generate(pattern_type: &str, keywords: &[String], pattern_indicators: &[String]) -> Self {
        let inputs = SignatureInputs::canonicalize(pattern_type, keywords, pattern_indicators);
        let digest = digest_of(&inputs);
        Self {
            signature_version: SIGNATURE_VERSION.to_string(),
            digest,
            inputs,
        }
    }

    /// `sig-v1:<hex>`.
    pub fn render(&self) -> String {
        format!("{}:{}", self.signature_version, self.digest)
    }

    /// Split a rendered signature into version and digest. Unknown
    /// versions and malformed digests are rejected.
    pub fn parse(rendered: &str) -> Result<(String, String), EventError> {
        let (version, digest) = rendered
            .split_once(':')
            .ok_or_else(|| EventError::validation("signature", "missing version prefix"))?;
        if version != SIGNATURE_VERSION {
            return Err(EventError::validation(
                "signature",
                format!("unsupported signature version '{version}'"),
            ));
        }
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EventError::validation("signature", "digest must be 64 hex characters"));
        }
        Ok((version.to_string(), digest.to_string()))
    }
}

impl fmt::Display for PatternSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.signature_version, self.digest)
    }
}

/// Length-prefixed fields, so distinct inputs never share an encoding.
fn digest_of(inputs: &SignatureInputs) -> String {
    let mut hasher = blake3::Hasher::new();
    update_field(&mut hasher, &inputs.pattern_type);
    for list in [&inputs.keywords, &inputs.pattern_indicators] {
        hasher.update(&(list.len() as u64).to_le_bytes());
        for item in list {
            update_field(&mut hasher, item);
        }
    }
    hasher.finalize().to_hex().to_string()
}

fn update_field(hasher: &mut blake3::Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}
