//! Decoding of the raw `initData` token.

use crate::error::InitDataError;
use serde_json::Value;

/// Launch data as received from the client, before the signature is checked.
///
/// The user id and `auth_date` are held privately: the only way to read them
/// is through [`SignatureVerifier::verify`](crate::SignatureVerifier::verify).
#[derive(Debug, Clone)]
pub struct UnverifiedLaunchData {
    pub(crate) fields: Vec<(String, String)>,
    pub(crate) canonical: String,
    pub(crate) claimed_hash: String,
    pub(crate) user_id: i64,
    pub(crate) auth_date: String,
    pub(crate) device_id: String,
}

impl UnverifiedLaunchData {
    /// Decode a launch-data token together with the device id claimed by the client.
    pub fn parse(init_data: &str, device_id: &str) -> Result<Self, InitDataError> {
        if init_data.is_empty() {
            return Err(InitDataError::MissingInput("initData"));
        }
        if device_id.is_empty() {
            return Err(InitDataError::MissingInput("deviceId"));
        }

        let mut fields = decode_pairs(init_data)?;

        // Every `hash` entry is excluded from the signed set; the first one is the claim.
        let claimed_hash = fields
            .iter()
            .find(|(key, _)| key == "hash")
            .map(|(_, value)| value.clone())
            .ok_or_else(|| InitDataError::MalformedPayload("hash field missing".into()))?;
        fields.retain(|(key, _)| key != "hash");

        let user = first_value(&fields, "user")
            .ok_or_else(|| InitDataError::MalformedPayload("user field missing".into()))?;
        let user_id = parse_user_id(user)?;

        let auth_date = first_value(&fields, "auth_date")
            .ok_or_else(|| InitDataError::MalformedPayload("auth_date field missing".into()))?
            .to_string();

        let canonical = canonical_string(&fields);

        Ok(Self {
            fields,
            canonical,
            claimed_hash,
            user_id,
            auth_date,
            device_id: device_id.to_string(),
        })
    }

    /// The data-check string the signature is computed over.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// The hash claimed by the client.
    pub fn claimed_hash(&self) -> &str {
        &self.claimed_hash
    }
}

/// Serialize a field set into the data-check string.
///
/// Entries are sorted by key (then value) and joined as `key=value` lines, so
/// the result does not depend on the order the fields arrived in.
pub fn canonical_string(fields: &[(String, String)]) -> String {
    let mut entries: Vec<&(String, String)> = fields.iter().collect();
    entries.sort();

    entries
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_value<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, value)| value.as_str())
}

fn decode_pairs(raw: &str) -> Result<Vec<(String, String)>, InitDataError> {
    raw.split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
            Ok((decode_component(key)?, decode_component(value)?))
        })
        .collect()
}

/// Form decoding: `+` is a space, percent escapes are UTF-8.
fn decode_component(raw: &str) -> Result<String, InitDataError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| InitDataError::MalformedPayload(format!("invalid encoding: {}", e)))
}

fn parse_user_id(user: &str) -> Result<i64, InitDataError> {
    let descriptor: Value = serde_json::from_str(user)
        .map_err(|e| InitDataError::MalformedPayload(format!("user is not valid JSON: {}", e)))?;

    descriptor
        .as_object()
        .ok_or_else(|| InitDataError::MalformedPayload("user is not a JSON object".into()))?
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| InitDataError::MalformedPayload("user.id missing or not an integer".into()))
}
