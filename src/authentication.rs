use crate::{
    context::RequestContext,
    entities::User,
    error::ApiError,
    repository::Repository,
};
use async_graphql::{Context, InputObject, Object, Result, SimpleObject};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

const TOKEN_TTL_DAYS: i64 = 30;

/// Claims embedded in every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, kept under the `id` key so tokens stay interchangeable with older clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Signing material derived from the process-wide secret.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            id: Some(user_id.to_string()),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(ApiError::TokenIssue)
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

pub async fn hash_password(password: String) -> Result<String, ApiError> {
    // argon2 is deliberately slow, keep it off the async workers
    let hash = tokio::task::spawn_blocking(move || password_auth::generate_hash(password)).await?;
    Ok(hash)
}

/// Never fails on a malformed or empty stored hash, it just doesn't match.
pub async fn verify_password(password: String, password_hash: String) -> Result<bool, ApiError> {
    if password_hash.is_empty() {
        return Ok(false);
    }
    let matches = tokio::task::spawn_blocking(move || {
        password_auth::verify_password(password, &password_hash).is_ok()
    })
    .await?;
    Ok(matches)
}

/// Stand-in hash checked when no account matches, so an unknown email costs
/// the same argon2 work as a wrong password.
fn dummy_password_hash() -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    DUMMY_HASH.get_or_init(|| password_auth::generate_hash("no account has this password"))
}

/// Runs a full verification that can never match.
pub async fn verify_without_account(password: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let _ = password_auth::verify_password(password, dummy_password_hash());
    })
    .await?;
    Ok(false)
}

/// Maps a raw bearer token to the user it names.
///
/// An absent, unverifiable or id-less token and a token naming a deleted user
/// all resolve to `None`. Only store failures are reported as errors.
pub async fn resolve_principal(
    token: Option<&str>,
    keys: &TokenKeys,
    repository: &Repository,
) -> Result<Option<User>, ApiError> {
    let Some(token) = token else {
        return Ok(None);
    };

    let claims = match keys.verify(token) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!(error = %err, "rejected bearer token");
            return Ok(None);
        }
    };

    let Some(user_id) = claims.id else {
        return Ok(None);
    };

    let user = repository.find_user(&user_id).await?;
    if user.is_none() {
        tracing::debug!(user_id = %user_id, "token names an unknown user");
    }
    Ok(user)
}

#[derive(Debug, InputObject)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, InputObject)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, SimpleObject)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[derive(Default)]
pub struct AuthMutation;

#[Object]
impl AuthMutation {
    async fn sign_up(&self, ctx: &Context<'_>, input: Option<SignUpInput>) -> Result<AuthUser> {
        let input = input.ok_or(ApiError::MissingInput("input"))?;
        let repository = &ctx.data::<RequestContext>()?.repository;
        let keys = ctx.data::<Arc<TokenKeys>>()?;

        let password_hash = hash_password(input.password).await?;
        let user = repository
            .insert_user(&input.name, &input.email, &password_hash, input.avatar.as_deref())
            .await?;
        tracing::info!(user_id = %user.id, "user signed up");

        let token = keys.issue(&user.id)?;
        Ok(AuthUser { user, token })
    }

    async fn sign_in(&self, ctx: &Context<'_>, input: Option<SignInInput>) -> Result<AuthUser> {
        let input = input.ok_or(ApiError::MissingInput("input"))?;
        let repository = &ctx.data::<RequestContext>()?.repository;
        let keys = ctx.data::<Arc<TokenKeys>>()?;

        // unknown email and wrong password look the same to the caller, in
        // both the error and the time taken
        let user = match repository.find_user_by_email(&input.email).await? {
            Some(user) => {
                let stored_hash = user.password_hash.clone();
                if !verify_password(input.password, stored_hash).await? {
                    return Err(ApiError::InvalidCredentials.into());
                }
                user
            }
            None => {
                verify_without_account(input.password).await?;
                return Err(ApiError::InvalidCredentials.into());
            }
        };

        let token = keys.issue(&user.id)?;
        Ok(AuthUser { user, token })
    }
}
