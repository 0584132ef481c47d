use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::models::Claims;

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn token_for(sub: &str, secret: &str, ttl_secs: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + ttl_secs) as usize,
            jti: "test-jti".to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_the_subject() {
        let token = token_for("u_8f3a", "secret", 900);
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "u_8f3a");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = token_for("u_8f3a", "secret", 900);
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = token_for("u_8f3a", "secret", -3600);
        assert!(verify_token(&token, "secret").is_err());
    }
}
