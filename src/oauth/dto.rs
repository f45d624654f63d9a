use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccessTokenQuery {
    pub access_token: Option<String>,
}

/// Response body for the token validity check. Field names match what the
/// frontend already consumes.
#[derive(Debug, Serialize)]
pub struct TokenValidity {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<String>,
    pub scopes: Option<Vec<String>>,
    #[serde(rename = "userId")]
    pub user_id: Option<Value>,
}

/// Map the provider's debug payload (`{"data": {is_valid, expires_at, scopes,
/// user_id}}`) into the response shape, converting the expiry from epoch
/// seconds to RFC3339. An expiry of 0 means the token never expires.
pub fn map_debug_payload(payload: &Value) -> TokenValidity {
    let data = payload.get("data").unwrap_or(payload);

    let is_valid = data
        .get("is_valid")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let expires_at = data
        .get("expires_at")
        .and_then(Value::as_i64)
        .filter(|&secs| secs > 0)
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|t| t.format(&Rfc3339).ok());

    let scopes = data.get("scopes").and_then(Value::as_array).map(|a| {
        a.iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    });

    let user_id = data.get("user_id").cloned().filter(|v| !v.is_null());

    TokenValidity {
        is_valid,
        expires_at,
        scopes,
        user_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_full_debug_payload() {
        let payload = json!({
            "data": {
                "is_valid": true,
                "expires_at": 1735689600,
                "scopes": ["instagram_business_basic"],
                "user_id": 17841400000000000u64
            }
        });
        let v = map_debug_payload(&payload);
        assert!(v.is_valid);
        assert_eq!(v.expires_at.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(v.scopes, Some(vec!["instagram_business_basic".to_string()]));
        assert!(v.user_id.is_some());
    }

    #[test]
    fn zero_expiry_means_no_expiry() {
        let payload = json!({"data": {"is_valid": true, "expires_at": 0}});
        let v = map_debug_payload(&payload);
        assert!(v.is_valid);
        assert!(v.expires_at.is_none());
    }

    #[test]
    fn invalid_or_empty_payload_maps_to_not_valid() {
        let v = map_debug_payload(&json!({}));
        assert!(!v.is_valid);
        assert!(v.scopes.is_none());
        assert!(v.user_id.is_none());
    }

    #[test]
    fn serializes_with_frontend_field_names() {
        let v = map_debug_payload(&json!({"data": {"is_valid": true, "expires_at": 1735689600}}));
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["isValid"], true);
        assert!(json.get("expiresAt").is_some());
        assert!(json.get("userId").is_some());
    }
}
