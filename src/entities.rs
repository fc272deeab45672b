use crate::{context::RequestContext, error::ApiError};
use async_graphql::{ComplexObject, Context, Result, SimpleObject, ID};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{types::Json, FromRow};

#[derive(Debug, Clone, FromRow, SimpleObject)]
#[graphql(complex)]
pub struct User {
    #[graphql(skip)]
    pub id: String,
    pub name: String,
    pub email: String,
    // never leaves the server
    #[graphql(skip)]
    pub password_hash: String,
    pub avatar: Option<String>,
}

#[ComplexObject]
impl User {
    async fn id(&self) -> ID {
        ID(self.id.clone())
    }
}

#[derive(Debug, Clone, FromRow, SimpleObject)]
#[graphql(complex)]
pub struct TaskList {
    #[graphql(skip)]
    pub id: String,
    pub title: String,
    #[graphql(skip)]
    pub created_at: DateTime<Utc>,
    /// Member user ids in insertion order.
    #[graphql(skip)]
    pub user_ids: Json<Vec<String>>,
}

impl TaskList {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.user_ids.iter().any(|id| id == user_id)
    }
}

#[ComplexObject]
impl TaskList {
    async fn id(&self) -> ID {
        ID(self.id.clone())
    }

    /// ISO-8601 timestamp with millisecond precision.
    async fn created_at(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Percentage of this list's to-dos that are completed.
    async fn progress(&self, ctx: &Context<'_>) -> Result<f64> {
        let repository = &ctx.data::<RequestContext>()?.repository;
        let (completed, total) = repository.count_todos_for_task_list(&self.id).await?;
        Ok(completion_percentage(completed, total))
    }

    /// Members in insertion order; a member id without a user resolves to null.
    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<Option<User>>> {
        let repository = &ctx.data::<RequestContext>()?.repository;
        let users = futures::future::try_join_all(
            self.user_ids.iter().map(|user_id| repository.find_user(user_id)),
        )
        .await?;
        Ok(users)
    }

    async fn todos(&self, ctx: &Context<'_>) -> Result<Option<Vec<Todo>>> {
        let repository = &ctx.data::<RequestContext>()?.repository;
        Ok(Some(repository.find_todos_for_task_list(&self.id).await?))
    }
}

pub fn completion_percentage(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

#[derive(Debug, Clone, FromRow, SimpleObject)]
#[graphql(name = "ToDo", complex)]
pub struct Todo {
    #[graphql(skip)]
    pub id: String,
    pub content: String,
    pub is_completed: bool,
    // plain text reference, not enforced by the store
    #[graphql(skip)]
    pub task_list_id: String,
}

#[ComplexObject]
impl Todo {
    async fn id(&self) -> ID {
        ID(self.id.clone())
    }

    async fn task_list(&self, ctx: &Context<'_>) -> Result<TaskList> {
        let repository = &ctx.data::<RequestContext>()?.repository;
        repository
            .find_task_list(&self.task_list_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Task list").into())
    }
}
