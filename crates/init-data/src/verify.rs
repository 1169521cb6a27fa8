//! HMAC-SHA256 signature check over the data-check string.

use crate::error::InitDataError;
use crate::parser::UnverifiedLaunchData;
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// HMAC keyed by `SHA256(secret)`.
///
/// HMAC zero-pads keys shorter than the hash block, so the 32-byte digest
/// placed in a zeroed 64-byte block yields the same MAC, and the block-sized
/// key makes construction infallible.
fn keyed_mac(secret: &[u8]) -> HmacSha256 {
    let digest = Sha256::digest(secret);
    let mut block = Key::<HmacSha256>::default();
    block[..digest.len()].copy_from_slice(&digest);
    <HmacSha256 as KeyInit>::new(&block)
}

/// Verifies launch data against the bot token it was signed with.
///
/// The HMAC key is `SHA256(bot_token)`; the secret itself is not retained.
#[derive(Clone)]
pub struct SignatureVerifier {
    mac: HmacSha256,
}

impl SignatureVerifier {
    /// Create a verifier for the given shared secret.
    pub fn new(shared_secret: &[u8]) -> Self {
        Self {
            mac: keyed_mac(shared_secret),
        }
    }

    /// Compute the hex signature for a data-check string.
    pub fn sign(&self, canonical: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check the claimed hash and unlock the signed fields.
    pub fn verify(&self, data: UnverifiedLaunchData) -> Result<VerifiedLaunchData, InitDataError> {
        // Only the exact lowercase rendering is accepted, as the hash is compared as text.
        if !is_lower_hex(&data.claimed_hash) {
            debug!("Claimed hash is not lowercase hex");
            return Err(InitDataError::InvalidSignature);
        }
        let claimed = hex::decode(&data.claimed_hash).map_err(|_| InitDataError::InvalidSignature)?;

        let mut mac = self.mac.clone();
        mac.update(data.canonical.as_bytes());
        mac.verify_slice(&claimed)
            .map_err(|_| InitDataError::InvalidSignature)?;

        Ok(VerifiedLaunchData {
            fields: data.fields,
            user_id: data.user_id,
            auth_date: data.auth_date,
            device_id: data.device_id,
        })
    }
}

fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Launch data whose signature has been checked.
#[derive(Debug, Clone)]
pub struct VerifiedLaunchData {
    fields: Vec<(String, String)>,
    user_id: i64,
    auth_date: String,
    device_id: String,
}

impl VerifiedLaunchData {
    /// Platform user id from the signed `user` descriptor.
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Raw `auth_date` value, not yet parsed.
    pub fn auth_date(&self) -> &str {
        &self.auth_date
    }

    /// Device id presented alongside the launch data (not covered by the signature).
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Any other signed field, e.g. `query_id` or `start_param`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::canonical_string;

    const TOKEN: &[u8] = b"123456:TEST-bot-token";

    fn signed_token(extra: &[(&str, &str)]) -> String {
        let mut fields: Vec<(String, String)> = vec![
            ("user".into(), r#"{"id":42}"#.into()),
            ("auth_date".into(), "1700000000".into()),
        ];
        fields.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        let hash = SignatureVerifier::new(TOKEN).sign(&canonical_string(&fields));

        let mut encoded: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        encoded.push(format!("hash={}", hash));
        encoded.join("&")
    }

    #[test]
    fn test_sign_matches_reference_construction() {
        // HMAC_SHA256(key = SHA256(token), data)
        let verifier = SignatureVerifier::new(TOKEN);
        let key = Sha256::digest(TOKEN);
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&key).unwrap();
        mac.update(b"auth_date=1\nuser={\"id\":1}");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(verifier.sign("auth_date=1\nuser={\"id\":1}"), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_padded_key_matches_digest_key() {
        for secret in [&b""[..], &b"1:x"[..], TOKEN, &[0xffu8; 200][..]] {
            let mut padded = keyed_mac(secret);
            let mut direct = <HmacSha256 as Mac>::new_from_slice(&Sha256::digest(secret)).unwrap();
            padded.update(b"payload");
            direct.update(b"payload");
            assert_eq!(padded.finalize().into_bytes(), direct.finalize().into_bytes());
        }
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let raw = signed_token(&[("query_id", "AAF1")]);
        let parsed = UnverifiedLaunchData::parse(&raw, "device-1").unwrap();
        let verified = SignatureVerifier::new(TOKEN).verify(parsed).unwrap();

        assert_eq!(verified.user_id(), 42);
        assert_eq!(verified.auth_date(), "1700000000");
        assert_eq!(verified.device_id(), "device-1");
        assert_eq!(verified.field("query_id"), Some("AAF1"));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let raw = signed_token(&[]);
        let parsed = UnverifiedLaunchData::parse(&raw, "d").unwrap();
        let result = SignatureVerifier::new(b"other-token").verify(parsed);
        assert_eq!(result.unwrap_err(), InitDataError::InvalidSignature);
    }

    #[test]
    fn test_verify_rejects_every_single_char_hash_mutation() {
        let raw = signed_token(&[]);
        let verifier = SignatureVerifier::new(TOKEN);
        let parsed = UnverifiedLaunchData::parse(&raw, "d").unwrap();
        let hash = parsed.claimed_hash().to_string();

        for i in 0..hash.len() {
            for replacement in ['0', 'f', 'A'] {
                let mut mutated: Vec<char> = hash.chars().collect();
                if mutated[i] == replacement {
                    continue;
                }
                mutated[i] = replacement;
                let mut data = parsed.clone();
                data.claimed_hash = mutated.into_iter().collect();
                assert_eq!(
                    verifier.verify(data).unwrap_err(),
                    InitDataError::InvalidSignature
                );
            }
        }
    }

    #[test]
    fn test_verify_rejects_field_value_mutation() {
        let raw = signed_token(&[("start_param", "abc")]);
        let tampered = raw.replace("start_param=abc", "start_param=abd");
        assert_ne!(raw, tampered);

        let parsed = UnverifiedLaunchData::parse(&tampered, "d").unwrap();
        let result = SignatureVerifier::new(TOKEN).verify(parsed);
        assert_eq!(result.unwrap_err(), InitDataError::InvalidSignature);
    }

    #[test]
    fn test_verify_rejects_non_hex_and_truncated_hash() {
        let verifier = SignatureVerifier::new(TOKEN);
        let raw = signed_token(&[]);
        let parsed = UnverifiedLaunchData::parse(&raw, "d").unwrap();

        for claimed in ["", "zz", &parsed.claimed_hash()[..62]] {
            let mut data = parsed.clone();
            data.claimed_hash = claimed.to_string();
            assert_eq!(
                verifier.verify(data).unwrap_err(),
                InitDataError::InvalidSignature
            );
        }
    }

    #[test]
    fn test_verify_is_deterministic_across_field_order() {
        let verifier = SignatureVerifier::new(TOKEN);
        let raw = signed_token(&[("chat_type", "private")]);

        // Same pairs, reversed order.
        let reversed: Vec<&str> = raw.split('&').rev().collect();
        let parsed = UnverifiedLaunchData::parse(&reversed.join("&"), "d").unwrap();
        assert!(verifier.verify(parsed).is_ok());
    }
}
