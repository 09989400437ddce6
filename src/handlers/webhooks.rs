use axum::{
    body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, routing::post, Router,
};
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};

use crate::{errors::ApiError, services::users::ClerkProfile, AppState};

type HmacSha256 = Hmac<Sha256>;

const SIGNING_SECRET_PREFIX: &str = "whsec_";

/// Identity-provider webhook. Payloads are signed with the Svix scheme: an
/// HMAC-SHA256 over `{id}.{timestamp}.{body}` keyed with the base64 secret,
/// carried in the `svix-signature` header as space-separated `v1,<sig>`
/// entries.
#[utoipa::path(
    post,
    path = "/api/webhooks/clerk",
    request_body = String,
    responses(
        (status = 200, description = "Webhook processed"),
        (status = 400, description = "Invalid signature or payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    match &state.config.clerk_webhook_secret {
        Some(secret) => {
            if !verify_signature(&headers, &body, secret, state.config.webhook_tolerance_secs) {
                warn!("clerk webhook signature verification failed");
                return Err(ApiError::BadRequest("invalid webhook signature".to_string()));
            }
        }
        None => warn!("clerk webhook secret not configured; accepting unverified payload"),
    }

    let json: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid json: {}", e)))?;
    let event_type = json.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let data = json.get("data").cloned().unwrap_or(Value::Null);

    match event_type {
        "user.created" | "user.updated" => {
            let profile = parse_profile(&data)
                .ok_or_else(|| ApiError::BadRequest("payload has no user id".to_string()))?;
            state.services.users.sync(profile).await?;
        }
        "user.deleted" => {
            let clerk_user_id = data
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ApiError::BadRequest("payload has no user id".to_string()))?;
            state.services.users.remove(clerk_user_id).await?;
        }
        other => {
            info!(event_type = other, "unhandled clerk webhook type");
        }
    }

    Ok((axum::http::StatusCode::OK, "ok"))
}

fn parse_profile(data: &Value) -> Option<ClerkProfile> {
    let clerk_user_id = data.get("id")?.as_str()?.to_string();
    let email = data
        .get("email_addresses")
        .and_then(|v| v.as_array())
        .and_then(|addrs| addrs.first())
        .and_then(|addr| addr.get("email_address"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let text = |key: &str| {
        data.get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    Some(ClerkProfile {
        clerk_user_id,
        email,
        first_name: text("first_name"),
        last_name: text("last_name"),
        username: text("username"),
        profile_image_url: text("image_url"),
    })
}

fn verify_signature(
    headers: &HeaderMap,
    payload: &Bytes,
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    let (Some(msg_id), Some(timestamp), Some(signatures)) = (
        headers.get("svix-id").and_then(|h| h.to_str().ok()),
        headers.get("svix-timestamp").and_then(|h| h.to_str().ok()),
        headers.get("svix-signature").and_then(|h| h.to_str().ok()),
    ) else {
        return false;
    };

    let Ok(ts) = timestamp.parse::<i64>() else {
        return false;
    };
    let now = chrono::Utc::now().timestamp();
    if (now - ts).unsigned_abs() > tolerance_secs {
        return false;
    }

    let key = secret.strip_prefix(SIGNING_SECRET_PREFIX).unwrap_or(secret);
    let Ok(key) = base64::engine::general_purpose::STANDARD.decode(key) else {
        return false;
    };

    let signed = format!(
        "{}.{}.{}",
        msg_id,
        timestamp,
        std::str::from_utf8(payload).unwrap_or("")
    );
    let Ok(mut mac) = HmacSha256::new_from_slice(&key) else {
        return false;
    };
    mac.update(signed.as_bytes());
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    // The header may carry several versioned signatures; any v1 match passes.
    signatures
        .split_whitespace()
        .filter_map(|entry| entry.strip_prefix("v1,"))
        .any(|sig| constant_time_eq(&expected, sig))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/clerk", post(clerk_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn sign(secret: &str, msg_id: &str, timestamp: i64, body: &str) -> String {
        let key = base64::engine::general_purpose::STANDARD
            .decode(secret.strip_prefix(SIGNING_SECRET_PREFIX).unwrap())
            .unwrap();
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(format!("{}.{}.{}", msg_id, timestamp, body).as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    fn headers_for(msg_id: &str, timestamp: i64, signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("svix-id", HeaderValue::from_str(msg_id).unwrap());
        headers.insert(
            "svix-timestamp",
            HeaderValue::from_str(&timestamp.to_string()).unwrap(),
        );
        headers.insert(
            "svix-signature",
            HeaderValue::from_str(&format!("v1,{}", signature)).unwrap(),
        );
        headers
    }

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

    #[test]
    fn valid_signature_passes() {
        let body = r#"{"type":"user.created","data":{"id":"user_1"}}"#;
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(SECRET, "msg_1", ts, body);
        let headers = headers_for("msg_1", ts, &sig);
        assert!(verify_signature(&headers, &Bytes::from(body), SECRET, 300));
    }

    #[test]
    fn tampered_body_fails() {
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(SECRET, "msg_1", ts, r#"{"original":true}"#);
        let headers = headers_for("msg_1", ts, &sig);
        assert!(!verify_signature(
            &headers,
            &Bytes::from(r#"{"original":false}"#),
            SECRET,
            300
        ));
    }

    #[test]
    fn stale_timestamp_fails() {
        let body = "{}";
        let ts = chrono::Utc::now().timestamp() - 3600;
        let sig = sign(SECRET, "msg_1", ts, body);
        let headers = headers_for("msg_1", ts, &sig);
        assert!(!verify_signature(&headers, &Bytes::from(body), SECRET, 300));
    }

    #[test]
    fn missing_headers_fail() {
        let headers = HeaderMap::new();
        assert!(!verify_signature(&headers, &Bytes::from("{}"), SECRET, 300));
    }

    #[test]
    fn profile_is_extracted_from_payload() {
        let data: Value = serde_json::from_str(
            r#"{
                "id": "user_29w83",
                "email_addresses": [{"email_address": "ops@example.com"}],
                "first_name": "Ada",
                "last_name": "Park",
                "username": null,
                "image_url": "https://img.example.com/u.png"
            }"#,
        )
        .unwrap();
        let profile = parse_profile(&data).unwrap();
        assert_eq!(profile.clerk_user_id, "user_29w83");
        assert_eq!(profile.email.as_deref(), Some("ops@example.com"));
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert!(profile.username.is_none());
    }
}
