use log::debug;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::Request;

use dice_server::auth::verify_token;
use dice_server::error::AuthError;

use crate::ApiState;

/// Caller identified by a valid `Authorization: Bearer <jwt>` header.
pub struct AuthenticatedUser(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(state) = request.rocket().state::<ApiState>() else {
            return Outcome::Error((Status::InternalServerError, AuthError::MissingToken));
        };
        let token = request
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "));
        let Some(token) = token else {
            return Outcome::Error((Status::Unauthorized, AuthError::MissingToken));
        };

        match verify_token(token.trim(), state.jwt_secret.as_bytes()) {
            Ok(claims) => Outcome::Success(AuthenticatedUser(claims.sub)),
            Err(e) => {
                debug!("rejected bearer token: {}", e);
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}
