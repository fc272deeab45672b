use crate::{
    authentication::{AuthMutation, TokenKeys},
    crud_ops::{TaskListMutation, TaskListQuery, TodoMutation},
};
use async_graphql::{extensions::Tracing, EmptySubscription, MergedObject, Schema};
use std::sync::Arc;

pub type TaskListSchema = Schema<Query, Mutation, EmptySubscription>;

#[derive(MergedObject, Default)]
pub struct Query(TaskListQuery);

#[derive(MergedObject, Default)]
pub struct Mutation(AuthMutation, TaskListMutation, TodoMutation);

pub fn build_schema(token_keys: Arc<TokenKeys>) -> TaskListSchema {
    Schema::build(Query::default(), Mutation::default(), EmptySubscription)
        .extension(Tracing)
        .data(token_keys)
        .finish()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{context::AppState, context::RequestContext, repository};
    use async_graphql::Request;
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
    use serde_json::Value;

    pub struct TestServer {
        pub state: AppState,
    }

    impl TestServer {
        pub async fn new() -> Self {
            Self {
                state: AppState::new(repository::in_memory().await, "test-secret"),
            }
        }
    }

    /// Runs a query the way the HTTP handler does and returns the JSON response.
    pub async fn execute(server: &TestServer, token: Option<&str>, query: &str) -> Value {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(token).unwrap());
        }
        let context = RequestContext::from_headers(&server.state, &headers)
            .await
            .unwrap();
        let response = server
            .state
            .schema
            .execute(Request::new(query).data(context))
            .await;
        serde_json::to_value(&response).unwrap()
    }

    /// Signs up a user and returns `(id, token)`.
    pub async fn sign_up(server: &TestServer, email: &str, password: &str) -> (String, String) {
        let response = execute(
            server,
            None,
            &format!(
                r#"mutation {{ signUp(input: {{ email: "{email}", password: "{password}", name: "Tester" }}) {{ user {{ id }} token }} }}"#
            ),
        )
        .await;
        let auth = &response["data"]["signUp"];
        (
            auth["user"]["id"].as_str().unwrap().to_string(),
            auth["token"].as_str().unwrap().to_string(),
        )
    }
}
