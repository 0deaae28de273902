//! Token gates for the three caller scopes.
//!
//! - Operator: one global token guarding mutating operator endpoints and the
//!   listings that expose scheduling internals.
//! - Device: per-device tokens with an optional `*` wildcard. When no device
//!   map is configured at all, device endpoints fall back to the operator
//!   token so single-device deployments need only one secret.
//! - Public photo: a narrow token for `/public/daily.bmp`; unset disables the
//!   endpoint entirely.
//!
//! All comparisons are constant-time.

use std::collections::HashMap;

use subtle::ConstantTimeEq;

use crate::error::{ApiError, ApiResult};

/// Resolved token configuration.
#[derive(Debug, Default, Clone)]
pub struct AuthGate {
    operator_token: Option<String>,
    device_tokens: HashMap<String, String>,
    public_photo_token: Option<String>,
}

fn ct_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Parse the device token map from its two accepted sources.
///
/// `DEVICE_TOKEN_MAP_JSON` (a JSON object of `device_id -> token`) wins over
/// the comma-separated `DEVICE_TOKEN_MAP` (`id=token,id=token`) fallback.
/// Blank entries are dropped.
pub fn parse_device_token_map(
    json_source: Option<&str>,
    csv_source: Option<&str>,
) -> ApiResult<HashMap<String, String>> {
    if let Some(raw) = json_source {
        let parsed: HashMap<String, String> = serde_json::from_str(raw)
            .map_err(|e| ApiError::ClientInput(format!("DEVICE_TOKEN_MAP_JSON invalid: {e}")))?;
        return Ok(parsed
            .into_iter()
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect());
    }

    let mut map = HashMap::new();
    if let Some(raw) = csv_source {
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let Some((id, token)) = entry.split_once('=') else {
                return Err(ApiError::ClientInput(format!(
                    "DEVICE_TOKEN_MAP entry without '=': {entry}"
                )));
            };
            let (id, token) = (id.trim(), token.trim());
            if !id.is_empty() && !token.is_empty() {
                map.insert(id.to_string(), token.to_string());
            }
        }
    }
    Ok(map)
}

impl AuthGate {
    /// Build a gate from the already-resolved secrets.
    pub fn new(
        operator_token: Option<String>,
        device_tokens: HashMap<String, String>,
        public_photo_token: Option<String>,
    ) -> Self {
        Self {
            operator_token,
            device_tokens,
            public_photo_token,
        }
    }

    /// Gate an operator-scope request. An unset operator token leaves the
    /// gate open.
    pub fn require_operator(&self, provided: Option<&str>) -> ApiResult<()> {
        match &self.operator_token {
            None => Ok(()),
            Some(expected) => match provided {
                Some(p) if ct_eq(expected, p) => Ok(()),
                _ => Err(ApiError::Auth),
            },
        }
    }

    /// Gate a device-scope request for `device_id`.
    ///
    /// Resolution order: exact entry, then `*` wildcard. With no map
    /// configured the operator gate applies instead.
    pub fn require_device(&self, device_id: &str, provided: Option<&str>) -> ApiResult<()> {
        if self.device_tokens.is_empty() {
            return self.require_operator(provided);
        }
        let expected = self
            .device_tokens
            .get(device_id)
            .or_else(|| self.device_tokens.get("*"));
        match (expected, provided) {
            (Some(e), Some(p)) if ct_eq(e, p) => Ok(()),
            _ => Err(ApiError::Auth),
        }
    }

    /// Gate the public photo endpoint. Unset token means disabled (403).
    pub fn require_public_photo(&self, provided: Option<&str>) -> ApiResult<()> {
        match &self.public_photo_token {
            None => Err(ApiError::Disabled("public photo endpoint disabled".into())),
            Some(expected) => match provided {
                Some(p) if ct_eq(expected, p) => Ok(()),
                _ => Err(ApiError::Auth),
            },
        }
    }
}

/// Mask a secret for operator-facing views: first two and last two characters
/// when longer than four, all asterisks otherwise.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 4 {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{head}{}{tail}", "*".repeat(chars.len() - 4))
    } else {
        "*".repeat(chars.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(map: &[(&str, &str)], operator: Option<&str>) -> AuthGate {
        AuthGate::new(
            operator.map(str::to_string),
            map.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            None,
        )
    }

    #[test]
    fn json_map_wins_over_csv() {
        let map = parse_device_token_map(
            Some(r#"{"frame-01": "aaa"}"#),
            Some("frame-01=bbb,frame-02=ccc"),
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["frame-01"], "aaa");
    }

    #[test]
    fn csv_map_parses_and_trims() {
        let map = parse_device_token_map(None, Some(" frame-01 = aaa , frame-02=bbb ,")).unwrap();
        assert_eq!(map["frame-01"], "aaa");
        assert_eq!(map["frame-02"], "bbb");
    }

    #[test]
    fn csv_entry_without_equals_is_rejected() {
        assert!(parse_device_token_map(None, Some("frame-01")).is_err());
    }

    #[test]
    fn exact_entry_beats_wildcard() {
        let g = gate(&[("frame-01", "aaa"), ("*", "www")], None);
        assert!(g.require_device("frame-01", Some("aaa")).is_ok());
        assert!(g.require_device("frame-01", Some("www")).is_err());
        assert!(g.require_device("frame-99", Some("www")).is_ok());
    }

    #[test]
    fn no_map_falls_back_to_operator_token() {
        let g = gate(&[], Some("op-secret"));
        assert!(g.require_device("frame-01", Some("op-secret")).is_ok());
        assert!(g.require_device("frame-01", Some("wrong")).is_err());
        assert!(g.require_device("frame-01", None).is_err());
    }

    #[test]
    fn unset_operator_token_leaves_gate_open() {
        let g = gate(&[], None);
        assert!(g.require_operator(None).is_ok());
        assert!(g.require_device("frame-01", None).is_ok());
    }

    #[test]
    fn public_photo_disabled_without_token() {
        let g = AuthGate::new(None, HashMap::new(), None);
        assert!(matches!(
            g.require_public_photo(Some("t")),
            Err(ApiError::Disabled(_))
        ));

        let g = AuthGate::new(None, HashMap::new(), Some("t".into()));
        assert!(g.require_public_photo(Some("t")).is_ok());
        assert!(g.require_public_photo(None).is_err());
    }

    #[test]
    fn masking_shows_only_edges() {
        assert_eq!(mask_secret("supersecret"), "su*******et");
        assert_eq!(mask_secret("abcd"), "****");
        assert_eq!(mask_secret(""), "");
    }
}
