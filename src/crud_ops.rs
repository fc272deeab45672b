use crate::{
    context::RequestContext,
    entities::{TaskList, Todo},
    error::ApiError,
};
use async_graphql::{Context, Object, Result, ID};
use chrono::Utc;

// Every operation below requires a signed-in caller. Membership is only
// consulted when adding users, and only to avoid duplicate entries.

#[derive(Default)]
pub struct TaskListQuery;

#[Object]
impl TaskListQuery {
    /// Task lists the caller is a member of.
    async fn my_task_lists(&self, ctx: &Context<'_>) -> Result<Vec<TaskList>> {
        let context = ctx.data::<RequestContext>()?;
        let user = context.principal()?;

        Ok(context.repository.find_task_lists_for_member(&user.id).await?)
    }

    /// Any task list by id, member or not.
    async fn get_task_list(&self, ctx: &Context<'_>, id: ID) -> Result<Option<TaskList>> {
        let context = ctx.data::<RequestContext>()?;
        context.principal()?;

        Ok(context.repository.find_task_list(&id).await?)
    }
}

#[derive(Default)]
pub struct TaskListMutation;

#[Object]
impl TaskListMutation {
    async fn create_task_list(&self, ctx: &Context<'_>, title: String) -> Result<TaskList> {
        let context = ctx.data::<RequestContext>()?;
        let user = context.principal()?;

        let task_list = context
            .repository
            .insert_task_list(&title, Utc::now(), &user.id)
            .await?;
        tracing::info!(task_list_id = %task_list.id, user_id = %user.id, "task list created");
        Ok(task_list)
    }

    async fn update_task_list(&self, ctx: &Context<'_>, id: ID, title: String) -> Result<TaskList> {
        let context = ctx.data::<RequestContext>()?;
        context.principal()?;

        context.repository.update_task_list_title(&id, &title).await?;
        context
            .repository
            .find_task_list(&id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Task list").into())
    }

    /// Always reports success. To-dos of the deleted list are left in place.
    async fn delete_task_list(&self, ctx: &Context<'_>, id: ID) -> Result<Option<bool>> {
        let context = ctx.data::<RequestContext>()?;
        context.principal()?;

        context.repository.delete_task_list(&id).await?;
        Ok(Some(true))
    }

    /// Returns null for an unknown list. Adding an existing member is a no-op.
    async fn add_user_to_task_list(
        &self,
        ctx: &Context<'_>,
        task_list_id: ID,
        user_id: ID,
    ) -> Result<Option<TaskList>> {
        let context = ctx.data::<RequestContext>()?;
        context.principal()?;

        let Some(task_list) = context.repository.find_task_list(&task_list_id).await? else {
            return Ok(None);
        };
        if task_list.has_member(&user_id) {
            return Ok(Some(task_list));
        }

        context
            .repository
            .push_task_list_member(&task_list_id, &user_id)
            .await?;
        Ok(context.repository.find_task_list(&task_list_id).await?)
    }
}

#[derive(Default)]
pub struct TodoMutation;

#[Object]
impl TodoMutation {
    /// The referenced list is not checked for existence.
    async fn create_todo(
        &self,
        ctx: &Context<'_>,
        content: String,
        task_list_id: ID,
    ) -> Result<Todo> {
        let context = ctx.data::<RequestContext>()?;
        context.principal()?;

        Ok(context.repository.insert_todo(&content, &task_list_id).await?)
    }

    #[graphql(name = "updateToDo")]
    async fn update_todo(
        &self,
        ctx: &Context<'_>,
        id: ID,
        content: Option<String>,
        is_completed: Option<bool>,
    ) -> Result<Todo> {
        let context = ctx.data::<RequestContext>()?;
        context.principal()?;

        context
            .repository
            .update_todo(&id, content.as_deref(), is_completed)
            .await?;
        context
            .repository
            .find_todo(&id)
            .await?
            .ok_or_else(|| ApiError::NotFound("To-do").into())
    }

    #[graphql(name = "deleteToDo")]
    async fn delete_todo(&self, ctx: &Context<'_>, id: ID) -> Result<bool> {
        let context = ctx.data::<RequestContext>()?;
        context.principal()?;

        context.repository.delete_todo(&id).await?;
        Ok(true)
    }
}
