use crate::{
    authentication::{resolve_principal, TokenKeys},
    entities::User,
    error::ApiError,
    repository::Repository,
    schema::{build_schema, TaskListSchema},
};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::sync::Arc;

/// Application context built once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub repository: Repository,
    pub token_keys: Arc<TokenKeys>,
    pub schema: TaskListSchema,
}

impl AppState {
    pub fn new(repository: Repository, jwt_secret: &str) -> Self {
        let token_keys = Arc::new(TokenKeys::new(jwt_secret));
        let schema = build_schema(token_keys.clone());
        Self {
            repository,
            token_keys,
            schema,
        }
    }
}

/// Per-request data handed to every resolver.
pub struct RequestContext {
    pub repository: Repository,
    pub principal: Option<User>,
}

impl RequestContext {
    /// Resolves the caller from the raw `Authorization` header.
    ///
    /// The header value is used verbatim; a `Bearer ` prefix is not stripped.
    pub async fn from_headers(state: &AppState, headers: &HeaderMap) -> Result<Self, ApiError> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty());

        let principal = resolve_principal(token, &state.token_keys, &state.repository).await?;

        Ok(Self {
            repository: state.repository.clone(),
            principal,
        })
    }

    pub fn principal(&self) -> Result<&User, ApiError> {
        self.principal
            .as_ref()
            .ok_or(ApiError::AuthenticationRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn raw_header_resolves_principal() {
        let state = AppState::new(repository::in_memory().await, "secret");
        let user = state
            .repository
            .insert_user("Ada", "ada@example.com", "hash", None)
            .await
            .unwrap();
        let token = state.token_keys.issue(&user.id).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&token).unwrap());
        let context = RequestContext::from_headers(&state, &headers).await.unwrap();
        assert_eq!(context.principal().unwrap().id, user.id);

        // prefixed credentials are not unwrapped
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let context = RequestContext::from_headers(&state, &headers).await.unwrap();
        assert!(context.principal.is_none());
    }

    #[tokio::test]
    async fn missing_or_empty_header_is_anonymous() {
        let state = AppState::new(repository::in_memory().await, "secret");

        let context = RequestContext::from_headers(&state, &HeaderMap::new())
            .await
            .unwrap();
        assert!(matches!(
            context.principal(),
            Err(ApiError::AuthenticationRequired)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(""));
        let context = RequestContext::from_headers(&state, &headers).await.unwrap();
        assert!(context.principal.is_none());
    }
}
