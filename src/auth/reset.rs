use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A pending password reset. Only `hash` and `expires_at` are stored; `token` goes to the user.
#[derive(Debug, Clone)]
pub struct ResetTicket {
    pub token: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetTicket {
    pub fn generate(ttl_minutes: i64) -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Self {
            hash: hash_token(&token),
            token,
            expires_at: Utc::now() + Duration::minutes(ttl_minutes),
        }
    }
}

/// Hex SHA-256 digest of a presented reset token.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_stores_digest_of_token() {
        let ticket = ResetTicket::generate(10);
        assert_eq!(ticket.token.len(), 64);
        assert_ne!(ticket.token, ticket.hash);
        assert_eq!(ticket.hash, hash_token(&ticket.token));
        assert!(ticket.expires_at > Utc::now() + Duration::minutes(9));
    }

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
