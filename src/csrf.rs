use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Namespace prefix of the token guarding article deletion.
pub const DELETE_NAMESPACE: &str = "delete";

pub fn delete_token_id(article_id: i64) -> String {
    format!("{DELETE_NAMESPACE}{article_id}")
}

pub trait CsrfTokens: Send + Sync {
    fn token(&self, token_id: &str) -> String;
    fn is_valid(&self, token_id: &str, token: &str) -> bool;
}

/// Tokens are `base64url(HMAC-SHA256(secret, token_id))`, so the same id
/// always yields the same token for a given secret.
pub struct HmacCsrfTokens {
    secret: Vec<u8>,
}

impl HmacCsrfTokens {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, token_id: &str) -> HmacSha256 {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac key of any size");
        mac.update(token_id.as_bytes());
        mac
    }
}

impl CsrfTokens for HmacCsrfTokens {
    fn token(&self, token_id: &str) -> String {
        URL_SAFE_NO_PAD.encode(self.mac(token_id).finalize().into_bytes())
    }

    fn is_valid(&self, token_id: &str, token: &str) -> bool {
        match URL_SAFE_NO_PAD.decode(token) {
            Ok(raw) => self.mac(token_id).verify_slice(&raw).is_ok(),
            Err(_) => false,
        }
    }
}
