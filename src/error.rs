#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication Error, Please sign in")]
    AuthenticationRequired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("argument `{0}` is required")]
    MissingInput(&'static str),

    #[error("could not issue token")]
    TokenIssue(#[source] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    PasswordTask(#[from] tokio::task::JoinError),
}
