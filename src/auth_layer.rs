use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::IntoResponse;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, span, Level};

use crate::error::ServerError;
use crate::service::ServiceState;
use crate::INIT_DATA_HEADER;

type HmacSha256 = Hmac<Sha256>;

/// Key used to derive the per-bot signing secret from the shared token.
const SECRET_DERIVATION_KEY: &[u8] = b"WebAppData";

/// Identity of the verified caller, inserted into request extensions.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

pub async fn init_data_auth_middleware(
    State(state): State<Arc<ServiceState>>,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ServerError> {
    let span = span!(Level::DEBUG, "auth");
    let _guard = span.enter();
    debug!("validating request for {}", &request.uri());

    let init_data = request
        .headers()
        .get(INIT_DATA_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::Unauthenticated)?;

    // every failure mode collapses to the same rejection
    let user_id = verify_init_data(init_data, &state.config.bot_token, state.config.auth_max_age)
        .ok_or(ServerError::Unauthenticated)?;

    request.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(request).await)
}

/// Verifies a signed key/value payload against the shared bot token and
/// returns the embedded user id.
///
/// The signature covers all fields except `hash`, sorted by key and rendered
/// `key=<percent-decoded value>` joined by newlines, keyed-hashed with a
/// secret derived by HMAC-SHA256("WebAppData", token). With `max_age` set,
/// the payload's `auth_date` must additionally fall inside the window;
/// without it a once-valid payload stays valid.
pub fn verify_init_data(init_data: &str, bot_token: &str, max_age: Option<u64>) -> Option<i64> {
    verify_init_data_at(init_data, bot_token, max_age, unix_now())
}

fn verify_init_data_at(
    init_data: &str,
    bot_token: &str,
    max_age: Option<u64>,
    now: u64,
) -> Option<i64> {
    let mut fields = BTreeMap::new();
    for item in init_data.split('&') {
        let parts: Vec<&str> = item.split('=').collect();
        if parts.len() != 2 {
            return None;
        }
        fields.insert(parts[0], parts[1]);
    }
    let supplied_hash = fields.remove("hash")?;
    let supplied_hash = hex::decode(supplied_hash).ok()?;

    let check_string = fields
        .iter()
        .map(|(key, value)| format!("{key}={}", percent_decode(value)))
        .collect::<Vec<_>>()
        .join("\n");

    let mut derive = HmacSha256::new_from_slice(SECRET_DERIVATION_KEY).ok()?;
    derive.update(bot_token.as_bytes());
    let secret = derive.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&secret).ok()?;
    mac.update(check_string.as_bytes());
    let computed = mac.finalize().into_bytes();

    if !constant_time_eq(&computed, &supplied_hash) {
        return None;
    }

    if let Some(window) = max_age {
        let auth_date: u64 = fields.get("auth_date")?.parse().ok()?;
        if now.saturating_sub(auth_date) > window {
            return None;
        }
    }

    let user_json = percent_decode(fields.get("user")?);
    let user: serde_json::Value = serde_json::from_str(&user_json).ok()?;
    user.get("id")?.as_i64()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Decodes %XX escapes; malformed escapes pass through literally and invalid
/// UTF-8 is replaced, matching the platform's lenient reference decoding.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let high = (bytes[i + 1] as char).to_digit(16);
            let low = (bytes[i + 2] as char).to_digit(16);
            if let (Some(high), Some(low)) = (high, low) {
                out.push((high * 16 + low) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "12345:TEST-token";

    /// Builds a payload signed the same way the platform signs real ones.
    fn sign(fields: &[(&str, &str)], token: &str) -> String {
        let mut sorted: Vec<_> = fields.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let check_string = sorted
            .iter()
            .map(|(k, v)| format!("{k}={}", percent_decode(v)))
            .collect::<Vec<_>>()
            .join("\n");

        let mut derive = HmacSha256::new_from_slice(SECRET_DERIVATION_KEY).unwrap();
        derive.update(token.as_bytes());
        let secret = derive.finalize().into_bytes();
        let mut mac = HmacSha256::new_from_slice(&secret).unwrap();
        mac.update(check_string.as_bytes());
        let hash = hex::encode(mac.finalize().into_bytes());

        let mut items: Vec<String> =
            fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
        items.push(format!("hash={hash}"));
        items.join("&")
    }

    fn sample_payload() -> String {
        sign(
            &[
                ("user", "%7B%22id%22%3A8675309%2C%22first_name%22%3A%22Ada%22%7D"),
                ("auth_date", "1700000000"),
                ("query_id", "AAF9x"),
            ],
            TOKEN,
        )
    }

    #[test]
    fn recovers_embedded_id_from_valid_payload() {
        assert_eq!(verify_init_data(&sample_payload(), TOKEN, None), Some(8675309));
    }

    #[test]
    fn rejects_mutated_hash() {
        let payload = sample_payload();
        let pos = payload.rfind("hash=").unwrap() + 5;
        let mut bytes = payload.into_bytes();
        bytes[pos] = if bytes[pos] == b'0' { b'1' } else { b'0' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert_eq!(verify_init_data(&tampered, TOKEN, None), None);
    }

    #[test]
    fn rejects_mutated_field() {
        let tampered = sample_payload().replace("auth_date=1700000000", "auth_date=1700000001");
        assert_eq!(verify_init_data(&tampered, TOKEN, None), None);
    }

    #[test]
    fn rejects_wrong_token() {
        assert_eq!(verify_init_data(&sample_payload(), "999:other", None), None);
    }

    #[test]
    fn rejects_missing_hash() {
        assert_eq!(verify_init_data("user=%7B%22id%22%3A1%7D&auth_date=1", TOKEN, None), None);
    }

    #[test]
    fn rejects_malformed_items() {
        assert_eq!(verify_init_data("", TOKEN, None), None);
        assert_eq!(verify_init_data("no-separator&hash=ab", TOKEN, None), None);
        assert_eq!(verify_init_data("a=b=c&hash=ab", TOKEN, None), None);
    }

    #[test]
    fn rejects_non_hex_hash() {
        assert_eq!(verify_init_data("user=%7B%22id%22%3A1%7D&hash=zzzz", TOKEN, None), None);
    }

    #[test]
    fn rejects_payload_without_user_id() {
        let payload = sign(&[("user", "%7B%22name%22%3A%22x%22%7D"), ("auth_date", "1")], TOKEN);
        assert_eq!(verify_init_data(&payload, TOKEN, None), None);
    }

    #[test]
    fn freshness_window_applies_when_configured() {
        let payload = sample_payload();
        // payload signed at 1700000000; window of 300s
        assert_eq!(
            verify_init_data_at(&payload, TOKEN, Some(300), 1700000100),
            Some(8675309)
        );
        assert_eq!(verify_init_data_at(&payload, TOKEN, Some(300), 1700000500), None);
        // without a configured window the same stale payload stays valid
        assert_eq!(
            verify_init_data_at(&payload, TOKEN, None, 1700000500),
            Some(8675309)
        );
    }

    #[test]
    fn percent_decoding_is_lenient() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%D0%B9"), "й");
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
