use serde::Serialize;
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthData {
    pub token: String,
    pub name: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
        }
    }
}

/// Authenticated caller, resolved once per request from the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub token_id: Uuid,
}
