use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Token purposes. A token minted for one purpose never verifies for another.
pub const PURPOSE_CONFIRM: &str = "confirm";
pub const PURPOSE_RESET: &str = "reset";
pub const PURPOSE_EMAIL_CHANGE: &str = "email-change";
pub const PURPOSE_API_AUTH: &str = "api-auth";

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    purpose: String,
    exp: i64,
}

fn sign(secret: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Compact signed token: `base64url(claims) . base64url(hmac)`, carrying the
/// user id as its single subject claim and an absolute unix expiry.
pub fn generate(secret: &str, user_id: &str, purpose: &str, ttl_secs: i64) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        purpose: purpose.to_string(),
        exp: chrono::Utc::now().timestamp() + ttl_secs,
    };
    let payload = serde_json::to_vec(&claims).expect("claims serialize");
    let sig = sign(secret, &payload);
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&payload),
        URL_SAFE_NO_PAD.encode(sig)
    )
}

/// Verification fails closed: any structural, signature, purpose or expiry
/// problem yields `None`.
pub fn verify(secret: &str, token: &str, purpose: &str) -> Option<String> {
    let (payload_b64, sig_b64) = token.split_once('.')?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let sig = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(&payload);
    mac.verify_slice(&sig).ok()?;

    let claims: Claims = serde_json::from_slice(&payload).ok()?;
    if claims.purpose != purpose {
        return None;
    }
    if claims.exp <= chrono::Utc::now().timestamp() {
        return None;
    }
    Some(claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn round_trip_returns_subject() {
        let token = generate(SECRET, "user-1", PURPOSE_CONFIRM, 3600);
        assert_eq!(
            verify(SECRET, &token, PURPOSE_CONFIRM),
            Some("user-1".to_string())
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate(SECRET, "user-1", PURPOSE_CONFIRM, -1);
        assert_eq!(verify(SECRET, &token, PURPOSE_CONFIRM), None);
    }

    #[test]
    fn purpose_mismatch_is_rejected() {
        let token = generate(SECRET, "user-1", PURPOSE_RESET, 3600);
        assert_eq!(verify(SECRET, &token, PURPOSE_CONFIRM), None);
        assert_eq!(verify(SECRET, &token, PURPOSE_API_AUTH), None);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate(SECRET, "user-1", PURPOSE_CONFIRM, 3600);
        assert_eq!(verify("other-secret", &token, PURPOSE_CONFIRM), None);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = generate(SECRET, "user-1", PURPOSE_CONFIRM, 3600);
        let (payload_b64, sig_b64) = token.split_once('.').unwrap();

        let mut payload = URL_SAFE_NO_PAD.decode(payload_b64).unwrap();
        let text = String::from_utf8(payload.clone()).unwrap();
        payload = text.replace("user-1", "user-2").into_bytes();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), sig_b64);

        assert_eq!(verify(SECRET, &forged, PURPOSE_CONFIRM), None);
    }

    #[test]
    fn garbage_never_panics() {
        for junk in ["", ".", "a.b", "not-a-token", "x..y", "a.b.c"] {
            assert_eq!(verify(SECRET, junk, PURPOSE_CONFIRM), None);
        }
    }
}
