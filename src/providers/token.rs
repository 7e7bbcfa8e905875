/// HS256 token signer backed by jsonwebtoken
///
/// Signs the node-provided payload with an `exp` claim derived from the
/// configured TTL; verification enforces expiry and returns the claims as
/// plain JSON for the auth middleware to publish into the variable scope.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use super::TokenSigner;

pub struct JwtSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl TokenSigner for JwtSigner {
    fn sign(&self, payload: &Map<String, Value>, ttl_secs: u64) -> anyhow::Result<String> {
        let now = chrono::Utc::now().timestamp();
        let mut claims = payload.clone();
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now + ttl_secs as i64));
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    fn verify(&self, token: &str) -> anyhow::Result<Value> {
        let data = decode::<Value>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sign_then_verify_round_trips_claims() {
        let signer = JwtSigner::new("test-secret");
        let payload = json!({"sub": "user-1", "role": "admin"})
            .as_object()
            .cloned()
            .unwrap();
        let token = signer.sign(&payload, 60).unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.get("sub"), Some(&json!("user-1")));
        assert_eq!(claims.get("role"), Some(&json!("admin")));
        assert!(claims.get("exp").is_some());
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let signer = JwtSigner::new("secret-a");
        let payload = json!({"sub": "user-1"}).as_object().cloned().unwrap();
        let token = signer.sign(&payload, 60).unwrap();
        assert!(JwtSigner::new("secret-b").verify(&token).is_err());
    }
}
