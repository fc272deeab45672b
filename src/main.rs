use async_graphql::{http::GraphiQLSource, ServerError};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{Config, ConfigError},
    context::{AppState, RequestContext},
    repository::Repository,
};

mod authentication;
mod config;
mod context;
mod crud_ops;
mod entities;
mod error;
mod repository;
mod schema;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let request = request.into_inner();
    match RequestContext::from_headers(&state, &headers).await {
        Ok(context) => state.schema.execute(request.data(context)).await.into(),
        Err(err) => {
            tracing::error!(error = %err, "could not resolve request context");
            async_graphql::Response::from_errors(vec![ServerError::new(err.to_string(), None)])
                .into()
        }
    }
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/").finish())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(graphiql).post(graphql_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn serve(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn run_server(config: Config) -> Result<(), StartupError> {
    let repository = Repository::connect(&config).await?;
    tracing::info!(database = %config.database_name, "connection with database established");

    let state = AppState::new(repository, &config.jwt_secret);

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("server ready at http://{}/", listener.local_addr()?);
    serve(listener, state).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let result = match Config::from_env() {
        Ok(config) => run_server(config).await,
        Err(err) => Err(err.into()),
    };
    if let Err(err) = result {
        tracing::error!("run server error: {err}");
        std::process::exit(1);
    }
}
