// src/common/id_generator.rs
//! Crockford Base32 ID Generator
//!
//! Generates human-readable, prefixed IDs using Crockford Base32 encoding.
//! Format: PREFIX_XXXXXX (e.g., US_K7NP3X for usage records)

use rand::Rng;

/// Crockford Base32 alphabet (excludes I, L, O, U to avoid confusion)
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Entity type prefixes for ID generation
#[derive(Debug, Clone, Copy)]
pub enum EntityPrefix {
    /// Usage / subscription record (US_)
    UsageRecord,
    /// Stored API key (K_)
    ApiKey,
}

impl EntityPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::UsageRecord => "US",
            EntityPrefix::ApiKey => "K",
        }
    }
}

fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..32);
            CROCKFORD_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a prefixed ID using Crockford Base32 encoding
pub fn generate_id(prefix: EntityPrefix) -> String {
    format!("{}_{}", prefix.as_str(), generate_crockford_string(6))
}

/// Generate a Usage Record ID (US_XXXXXX)
pub fn generate_usage_record_id() -> String {
    generate_id(EntityPrefix::UsageRecord)
}

/// Generate an API Key ID (K_XXXXXX)
pub fn generate_api_key_id() -> String {
    generate_id(EntityPrefix::ApiKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_format() {
        let id = generate_usage_record_id();
        assert!(id.starts_with("US_"));
        assert_eq!(id.len(), 9);

        let key_id = generate_api_key_id();
        assert!(key_id.starts_with("K_"));
        assert_eq!(key_id.len(), 8);
    }

    #[test]
    fn test_crockford_alphabet_only() {
        let id = generate_usage_record_id();
        for c in id[3..].chars() {
            assert!(
                CROCKFORD_ALPHABET.contains(&(c as u8)),
                "Character '{}' not in Crockford alphabet",
                c
            );
        }
    }

    #[test]
    fn test_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            assert!(ids.insert(generate_usage_record_id()), "Duplicate ID generated");
        }
    }
}
