use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;

use crate::auth::claims::Claims;
use crate::auth::Identity;
use crate::error::AuthError;

pub fn create_token(username: &str, secret: &[u8], ttl: Duration) -> Result<String, AuthError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let claims = Claims {
        sub: username.to_string(),
        exp: (now + ttl.as_secs()) as usize,
    };

    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))?)
}

pub fn verify_token(token: &str, secret: &[u8]) -> Result<Claims, AuthError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret), &Validation::default())
        .map(|data| data.claims)
        .map_err(AuthError::from)
}

/// Missing, malformed and expired tokens all resolve to an anonymous caller.
pub fn identity_from_token(token: Option<&str>, secret: &[u8]) -> Identity {
    let Some(token) = token else {
        return Identity::Anonymous;
    };
    match verify_token(token, secret) {
        Ok(claims) if !claims.sub.is_empty() => Identity::User(claims.sub),
        Ok(_) => Identity::Anonymous,
        Err(e) => {
            debug!("rejecting credential: {}", e);
            Identity::Anonymous
        }
    }
}
