use std::sync::Arc;

use axum::extract::FromRef;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    auth::{
        dto::{AuthData, Principal, PublicUser},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{EmailTaken, TokenRepo, UserRepo},
        repo_types::{NewUser, User},
    },
    error::{ApiError, ApiResult},
    payload::Payload,
    state::AppState,
    validation::{validate, Rule, RuleSet},
};

pub const REGISTER_RULES: RuleSet = &[
    ("name", &[Rule::Required, Rule::String]),
    ("email", &[Rule::Required, Rule::Email]),
    ("password", &[Rule::Required, Rule::String]),
    ("c_password", &[Rule::Required, Rule::String, Rule::Same("password")]),
];

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Verifies credentials and manages the lifecycle of bearer tokens.
#[derive(Clone)]
pub struct CredentialService {
    users: Arc<dyn UserRepo>,
    tokens: Arc<dyn TokenRepo>,
    keys: JwtKeys,
}

impl FromRef<AppState> for CredentialService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.tokens.clone(),
            JwtKeys::from_ref(state),
        )
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl CredentialService {
    pub fn new(users: Arc<dyn UserRepo>, tokens: Arc<dyn TokenRepo>, keys: JwtKeys) -> Self {
        Self { users, tokens, keys }
    }

    pub async fn register(&self, payload: Payload) -> ApiResult<AuthData> {
        let mut fields = payload.trimmed(&["password", "c_password"]).0;
        if let Some(Value::String(email)) = fields.get_mut("email") {
            *email = normalize_email(email);
        }

        if let Err(errors) = validate(REGISTER_RULES, &fields) {
            warn!(fields = ?errors.keys().collect::<Vec<_>>(), "register validation failed");
            return Err(ApiError::Validation(errors));
        }
        // presence is guaranteed by REGISTER_RULES
        let text = |field: &str| {
            fields
                .get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let (name, email, password) = (text("name"), text("email"), text("password"));

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(%email, "email already registered");
            return Err(ApiError::Conflict("The email has already been taken.".into()));
        }

        let password_hash = hash_password(&password)?;
        let user = match self
            .users
            .create(NewUser {
                name,
                email,
                password_hash,
            })
            .await
        {
            Ok(u) => u,
            Err(e) if e.is::<EmailTaken>() => {
                warn!("email registered concurrently");
                return Err(ApiError::Conflict("The email has already been taken.".into()));
            }
            Err(e) => return Err(e.into()),
        };

        let token = self.issue(&user).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(AuthData {
            token,
            name: user.name,
        })
    }

    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> ApiResult<AuthData> {
        let (Some(email), Some(password)) = (email, password) else {
            warn!("login without email or password");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
        };
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!(%email, "login unknown email");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(%email, user_id = %user.id, "login invalid password");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
        }

        let token = self.issue(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthData {
            token,
            name: user.name,
        })
    }

    /// Revokes the presented token. Unknown, expired or already revoked
    /// tokens are accepted silently.
    pub async fn logout(&self, token: &str) -> ApiResult<()> {
        let claims = match self.keys.verify(token) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "logout with unverifiable token");
                return Ok(());
            }
        };

        if self.tokens.revoke(claims.jti).await? {
            info!(user_id = %claims.sub, token_id = %claims.jti, "token revoked");
        } else {
            debug!(token_id = %claims.jti, "token already revoked");
        }
        Ok(())
    }

    pub async fn authenticate(&self, token: &str) -> ApiResult<Principal> {
        let claims = self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            ApiError::Unauthorized("Invalid or expired token")
        })?;

        match self.tokens.find_active(claims.jti).await? {
            Some(t) if t.user_id == claims.sub => Ok(Principal {
                user_id: t.user_id,
                token_id: t.id,
            }),
            _ => {
                warn!(token_id = %claims.jti, "revoked or unknown token");
                Err(ApiError::Unauthorized("Token has been revoked"))
            }
        }
    }

    pub async fn current_user(&self, principal: Principal) -> ApiResult<PublicUser> {
        self.users
            .find(principal.user_id)
            .await?
            .map(PublicUser::from)
            .ok_or(ApiError::Unauthorized("User not found"))
    }

    async fn issue(&self, user: &User) -> anyhow::Result<String> {
        let record = self.tokens.issue(user.id).await?;
        self.keys.sign(user.id, record.id)
    }
}
