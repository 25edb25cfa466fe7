//! Endpoints that change posts and hand the follow-up notification to the
//! worker queue.

use axum::Json;
use axum::extract::Path;
use serde_json::Value;

use super::actions::{CommentInput, PostInput, SetResponse};
use super::context::RequestContext;
use super::response::{ApiError, JsonBody, ok};
use crate::posts::{Comment, Post, PostStatus};
use crate::tasks;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// POST /api/v1/posts
pub async fn create_post(
    ctx: RequestContext,
    JsonBody(input): JsonBody<PostInput>,
) -> ApiResult<Post> {
    let user = ctx.require_user()?;
    input.validate()?;

    let posts = &ctx.services().posts;
    let post = posts
        .add(input.title.trim(), input.description.trim(), user)
        .await?;
    posts.add_vote(post.number, user).await?;
    let post = posts.get_by_number(post.number).await?;

    ctx.enqueue(tasks::notify_about_new_post(
        ctx.services().clone(),
        post.clone(),
    ));
    Ok(Json(post))
}

/// PUT /api/v1/posts/{number}/status
pub async fn set_response(
    ctx: RequestContext,
    Path(number): Path<u64>,
    JsonBody(input): JsonBody<SetResponse>,
) -> ApiResult<Value> {
    let user = ctx.require_user()?;
    if !user.is_staff() {
        return Err(ApiError::Forbidden("Only staff can respond to posts".into()));
    }
    let status = input.validate(number)?;

    let posts = &ctx.services().posts;
    let previous = posts.get_by_number(number).await?.status;
    let post = match (status, input.original_number) {
        (PostStatus::Duplicate, Some(original)) => {
            posts.mark_as_duplicate(number, original, user).await?
        }
        _ => posts.set_response(number, input.text.trim(), status, user).await?,
    };

    ctx.enqueue(tasks::notify_about_status_change(
        ctx.services().clone(),
        post,
        previous,
    ));
    Ok(ok())
}

/// POST /api/v1/posts/{number}/comments
pub async fn post_comment(
    ctx: RequestContext,
    Path(number): Path<u64>,
    JsonBody(input): JsonBody<CommentInput>,
) -> ApiResult<Comment> {
    let user = ctx.require_user()?;
    input.validate()?;

    let posts = &ctx.services().posts;
    let post = posts.get_by_number(number).await?;
    let comment = posts.add_comment(number, input.content.trim(), user).await?;

    ctx.enqueue(tasks::notify_about_new_comment(
        ctx.services().clone(),
        post,
        comment.clone(),
    ));
    Ok(Json(comment))
}
