use crate::error::AppError;
use crate::model::role::Role;
use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized};
use futures::future::{Ready, ready};
use std::str::FromStr;

/// Authenticated principal, injected by the fronting identity provider
/// as trusted headers. The core does no session handling of its own.
pub struct AuthUser {
    pub user_id: u64,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user_id = match req
            .headers()
            .get("X-Auth-User")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            Some(id) => id,
            None => return ready(Err(ErrorUnauthorized("Missing principal"))),
        };

        let role = match req
            .headers()
            .get("X-Auth-Role")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| Role::from_str(v).ok())
        {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser { user_id, role }))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".to_string()))
        }
    }
}
