//! RSA-SHA256 request signing and access-token lifecycle.
//!
//! Ported from `original_source/packages/adapters/src/adapters/ssi/auth.py`:
//! the auth payload is canonicalized (sorted keys, no whitespace separators)
//! then signed with PKCS#1 v1.5 RSA-SHA256, matching `pkcs1_15.new(key).sign`
//! paired with `json.dumps(payload, sort_keys=True, separators=(",", ":"))`.
//! The token refresh buffer and double-checked-locking refresh pattern are
//! carried over verbatim.

use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// Matches the Python client's 300s early-refresh margin.
pub const TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("broker authentication failed: {0}")]
    Rejected(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Signing(#[from] rsa::signature::Error),
}

/// Canonical JSON: keys sorted lexicographically, no inter-token whitespace.
/// `serde_json::Map` iterates in insertion order, so the map is rebuilt with
/// keys sorted before serializing.
pub fn canonical_json(fields: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let mut map = Map::new();
    for (k, v) in sorted {
        map.insert(k.to_string(), Value::String(v.to_string()));
    }
    serde_json::to_string(&Value::Object(map)).expect("string map always serializes")
}

/// Sign the canonical JSON payload with RSA-SHA256 (PKCS#1 v1.5), returning
/// a base64-encoded signature.
pub fn sign_payload(private_key: &RsaPrivateKey, fields: &[(&str, &str)]) -> Result<String, AuthError> {
    let canonical = canonical_json(fields);
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key.try_sign(canonical.as_bytes())?;
    Ok(BASE64.encode(signature.to_bytes()))
}

#[derive(Debug, Clone, Default)]
struct TokenData {
    access_token: Option<String>,
    issued_at: Option<Instant>,
    expires_in: Duration,
}

impl TokenData {
    fn is_valid(&self) -> bool {
        match (&self.access_token, self.issued_at) {
            (Some(_), Some(issued)) => {
                issued.elapsed() + TOKEN_REFRESH_BUFFER < self.expires_in
            }
            _ => false,
        }
    }
}

/// Holds the current access token and coordinates refresh under contention:
/// every caller takes `refresh_lock` and re-checks validity before issuing a
/// network call, so concurrent callers never double-authenticate.
pub struct TokenState {
    data: Mutex<TokenData>,
}

impl TokenState {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(TokenData::default()),
        }
    }

    /// Return a valid access token, authenticating (or re-authenticating)
    /// through `authenticate` if the held token is missing or near expiry.
    pub async fn get_access_token<F, Fut>(&self, authenticate: F) -> Result<String, AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(String, Duration), AuthError>>,
    {
        {
            let guard = self.data.lock().await;
            if guard.is_valid() {
                return Ok(guard.access_token.clone().expect("validated above"));
            }
        }
        let mut guard = self.data.lock().await;
        if guard.is_valid() {
            return Ok(guard.access_token.clone().expect("validated above"));
        }
        let (token, expires_in) = authenticate().await?;
        guard.access_token = Some(token.clone());
        guard.issued_at = Some(Instant::now());
        guard.expires_in = expires_in;
        Ok(token)
    }
}

impl Default for TokenState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_keys_and_strips_whitespace() {
        let json = canonical_json(&[("timestamp", "2026-07-30T00:00:00Z"), ("consumerID", "abc")]);
        assert_eq!(json, r#"{"consumerID":"abc","timestamp":"2026-07-30T00:00:00Z"}"#);
    }

    #[test]
    fn sign_payload_produces_verifiable_signature() {
        use rsa::pkcs1v15::VerifyingKey;
        use rsa::signature::Verifier;

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public_key = private_key.to_public_key();

        let fields = [("consumerID", "client-1"), ("timestamp", "2026-07-30T09:00:00.000Z")];
        let sig_b64 = sign_payload(&private_key, &fields).unwrap();
        let sig_bytes = BASE64.decode(sig_b64).unwrap();
        let signature = rsa::pkcs1v15::Signature::try_from(sig_bytes.as_slice()).unwrap();

        let verifying_key = VerifyingKey::<Sha256>::new(public_key);
        let canonical = canonical_json(&fields);
        verifying_key.verify(canonical.as_bytes(), &signature).unwrap();
    }

    #[tokio::test]
    async fn token_state_reuses_valid_token_without_reauthenticating() {
        let state = TokenState::new();
        let calls = std::sync::atomic::AtomicUsize::new(0);

        for _ in 0..3 {
            let token = state
                .get_access_token(|| async {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(("tok-1".to_string(), Duration::from_secs(1800)))
                })
                .await
                .unwrap();
            assert_eq!(token, "tok-1");
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_state_reauthenticates_once_expired() {
        let state = TokenState::new();
        let first = state
            .get_access_token(|| async { Ok(("tok-1".to_string(), Duration::from_millis(1))) })
            .await
            .unwrap();
        assert_eq!(first, "tok-1");

        tokio::time::sleep(Duration::from_millis(5)).await;

        let second = state
            .get_access_token(|| async { Ok(("tok-2".to_string(), Duration::from_secs(1800))) })
            .await
            .unwrap();
        assert_eq!(second, "tok-2");
    }
}
