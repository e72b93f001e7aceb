//! Signed session tokens
//!
//! Tokens are compact HS256 JWTs carrying the nickname and its expiry:
//!
//! ```text
//! base64url({"alg":"HS256","typ":"JWT"}) . base64url({"nick":..,"expire":..}) . base64url(hmac)
//! ```

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// Fixed token header
const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Length of generated secrets in bytes
pub const GENERATED_SECRET_LEN: usize = 32;

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Registered nickname
    pub nick: String,
    /// Expiry as seconds since the Unix epoch
    pub expire: u64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Server-held signing secret
#[derive(Clone)]
pub struct SessionKeys {
    secret: Arc<[u8]>,
}

impl SessionKeys {
    /// Use a fixed secret
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, SessionError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SessionError::InvalidKey("secret is empty".into()));
        }
        Ok(Self {
            secret: secret.into(),
        })
    }

    /// Parse a hex-encoded secret
    pub fn from_hex(secret: &str) -> Result<Self, SessionError> {
        let bytes = hex::decode(secret.trim()).map_err(|e| SessionError::InvalidKey(e.to_string()))?;
        Self::new(bytes)
    }

    /// Generate a random secret; tokens die with the process
    pub fn generate() -> Self {
        let mut secret = vec![0u8; GENERATED_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        Self {
            secret: secret.into(),
        }
    }

    /// Sign `claims` into a token
    pub fn issue(&self, claims: &Claims) -> Result<String, SessionError> {
        let payload =
            serde_json::to_vec(claims).map_err(|e| SessionError::MalformedToken(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER_JSON),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Check the signature and expiry of `token` at time `now` (epoch seconds)
    pub fn verify(&self, token: &str, now: u64) -> Result<Claims, SessionError> {
        let mut segments = token.split('.');
        let (header_seg, payload_seg, signature_seg) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(header), Some(payload), Some(signature), None) => (header, payload, signature),
                _ => return Err(SessionError::MalformedToken("expected three segments".into())),
            };

        let header: Header = serde_json::from_slice(&decode_segment(header_seg)?)
            .map_err(|e| SessionError::MalformedToken(e.to_string()))?;
        if header.alg != "HS256" {
            return Err(SessionError::MalformedToken(format!(
                "unsupported algorithm: {}",
                header.alg
            )));
        }

        let signature = decode_segment(signature_seg)?;
        let signing_input = &token[..header_seg.len() + 1 + payload_seg.len()];
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&decode_segment(payload_seg)?)
            .map_err(|e| SessionError::MalformedToken(e.to_string()))?;

        if claims.expire < now {
            return Err(SessionError::Expired {
                expire: claims.expire,
            });
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, SessionError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| SessionError::InvalidKey(e.to_string()))
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, SessionError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| SessionError::MalformedToken(e.to_string()))
}
