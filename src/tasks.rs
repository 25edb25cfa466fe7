//! Notification tasks enqueued by request handlers.

use serde_json::json;
use tracing::info;

use crate::email::{Params, Recipient};
use crate::error::TaskError;
use crate::posts::{Comment, Post, PostStatus, User};
use crate::services::Services;
use crate::worker::{Task, TaskContext};

fn recipients(users: Vec<User>, except: &User) -> Vec<Recipient> {
    users
        .into_iter()
        .filter(|u| u.id != except.id && !u.email.trim().is_empty())
        .map(|u| Recipient::new(u.name, u.email))
        .collect()
}

fn post_params(services: &Services, post: &Post) -> Params {
    Params::new()
        .with("tenantName", services.site.name.clone())
        .with("title", post.title.clone())
        .with("number", post.number)
        .with("postLink", services.site.post_link(post.number, &post.slug))
}

/// Email staff members about a post they did not write.
pub fn notify_about_new_post(services: Services, post: Post) -> Task {
    let payload = json!({ "post": post.number });
    Task::new("NotifyAboutNewPost", move |ctx| {
        send_new_post(ctx, services, post)
    })
    .with_payload(payload)
}

async fn send_new_post(ctx: TaskContext, services: Services, post: Post) -> Result<(), TaskError> {
    let to = recipients(services.posts.staff().await, &post.author);
    let params = post_params(&services, &post)
        .with("description", post.description.clone())
        .with("author", post.author.name.clone());

    let sent = services.mailer.send("new_post", &params, &to).await?;
    info!(parent: ctx.span(), post = post.number, sent, "New post notification sent");
    Ok(())
}

/// Email subscribers when staff change a post's status.
pub fn notify_about_status_change(services: Services, post: Post, previous: PostStatus) -> Task {
    let payload = json!({ "post": post.number, "from": previous, "to": post.status });
    Task::new("NotifyAboutStatusChange", move |ctx| {
        send_status_change(ctx, services, post, previous)
    })
    .with_payload(payload)
}

async fn send_status_change(
    ctx: TaskContext,
    services: Services,
    post: Post,
    previous: PostStatus,
) -> Result<(), TaskError> {
    let Some(response) = post.response.clone() else {
        return Err(TaskError::Failed {
            name: ctx.task_name,
            reason: format!("post #{} has no response", post.number),
        });
    };
    if previous == post.status && response.original_number.is_none() {
        info!(parent: ctx.span(), post = post.number, "Status unchanged, nothing to notify");
        return Ok(());
    }

    let to = recipients(
        services.posts.subscribers(post.number).await?,
        &response.responded_by,
    );
    let duplicate = match response.original_number {
        Some(original) => {
            let original = services.posts.get_by_number(original).await?;
            format!(
                "Merged into #{}: {} ({})",
                original.number,
                original.title,
                services.site.post_link(original.number, &original.slug)
            )
        }
        None => String::new(),
    };
    let params = post_params(&services, &post)
        .with("responder", response.responded_by.name.clone())
        .with("status", post.status.to_string())
        .with("content", response.text.clone())
        .with("duplicate", duplicate);

    let sent = services.mailer.send("change_status", &params, &to).await?;
    info!(parent: ctx.span(), post = post.number, sent, "Status change notification sent");
    Ok(())
}

/// Email subscribers about a new comment.
pub fn notify_about_new_comment(services: Services, post: Post, comment: Comment) -> Task {
    let payload = json!({ "post": post.number, "comment": comment.id });
    Task::new("NotifyAboutNewComment", move |ctx| {
        send_new_comment(ctx, services, post, comment)
    })
    .with_payload(payload)
}

async fn send_new_comment(
    ctx: TaskContext,
    services: Services,
    post: Post,
    comment: Comment,
) -> Result<(), TaskError> {
    let to = recipients(
        services.posts.subscribers(post.number).await?,
        &comment.author,
    );
    let params = post_params(&services, &post)
        .with("author", comment.author.name.clone())
        .with("content", comment.content.clone());

    let sent = services.mailer.send("new_comment", &params, &to).await?;
    info!(parent: ctx.span(), post = post.number, sent, "New comment notification sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::email::mailer::testing::RecordingSender;
    use crate::email::{Mailer, RecipientFilter};
    use crate::posts::{InMemoryPostService, Role};
    use crate::services::Site;

    fn user(id: &str, role: Role) -> User {
        User::new(id, id.to_uppercase(), format!("{id}@example.com"), role)
    }

    fn services() -> (Services, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::default());
        let mailer = Mailer::new("noreply@example.com", RecipientFilter::allow_all(), sender.clone())
            .unwrap();
        let services = Services::new(
            Arc::new(InMemoryPostService::new()),
            Arc::new(mailer),
            Site {
                name: "Demo".into(),
                base_url: "http://demo.test/".into(),
            },
        );
        (services, sender)
    }

    async fn run(task: Task) -> Result<(), TaskError> {
        let (name, payload, run) = task.into_parts();
        run(TaskContext::new(Uuid::new_v4(), name, payload)).await
    }

    #[tokio::test]
    async fn new_post_notifies_staff_except_author() {
        let (services, sender) = services();
        let admin = user("admin", Role::Administrator);
        let other_admin = user("boss", Role::Administrator);
        services.posts.upsert_user(&admin).await;
        services.posts.upsert_user(&other_admin).await;
        services.posts.upsert_user(&user("jon", Role::Visitor)).await;
        let post = services
            .posts
            .add("Add dark mode please", "", &admin)
            .await
            .unwrap();

        run(notify_about_new_post(services.clone(), post)).await.unwrap();

        assert_eq!(sender.recipients(), vec!["boss@example.com"]);
        let email = &sender.sent.lock().unwrap()[0];
        assert_eq!(email.subject, "[Demo] Add dark mode please");
    }

    #[tokio::test]
    async fn status_change_notifies_subscribers_except_responder() {
        let (services, sender) = services();
        let jon = user("jon", Role::Visitor);
        let admin = user("admin", Role::Administrator);
        let post = services.posts.add("Add dark mode please", "", &jon).await.unwrap();
        services.posts.add_vote(1, &admin).await.unwrap();
        let updated = services
            .posts
            .set_response(1, "Shipping next week", PostStatus::Planned, &admin)
            .await
            .unwrap();

        run(notify_about_status_change(services.clone(), updated, post.status))
            .await
            .unwrap();

        assert_eq!(sender.recipients(), vec!["jon@example.com"]);
        let email = &sender.sent.lock().unwrap()[0];
        assert!(email.body.contains("<strong>planned</strong>"));
        assert!(email.body.contains("Shipping next week"));
    }

    #[tokio::test]
    async fn unchanged_status_sends_nothing() {
        let (services, sender) = services();
        let jon = user("jon", Role::Visitor);
        let admin = user("admin", Role::Administrator);
        services.posts.add("Add dark mode please", "", &jon).await.unwrap();
        let updated = services
            .posts
            .set_response(1, "Still open", PostStatus::Open, &admin)
            .await
            .unwrap();

        run(notify_about_status_change(services.clone(), updated, PostStatus::Open))
            .await
            .unwrap();
        assert!(sender.recipients().is_empty());
    }

    #[tokio::test]
    async fn new_comment_skips_commenter() {
        let (services, sender) = services();
        let jon = user("jon", Role::Visitor);
        let arya = user("arya", Role::Visitor);
        let post = services.posts.add("Add dark mode please", "", &jon).await.unwrap();
        let comment = services.posts.add_comment(1, "+1", &arya).await.unwrap();

        run(notify_about_new_comment(services.clone(), post, comment))
            .await
            .unwrap();

        assert_eq!(sender.recipients(), vec!["jon@example.com"]);
    }

    #[tokio::test]
    async fn payload_identifies_post() {
        let (services, _sender) = services();
        let jon = user("jon", Role::Visitor);
        let post = services.posts.add("Add dark mode please", "", &jon).await.unwrap();

        let task = notify_about_new_post(services, post);
        assert_eq!(task.name(), "NotifyAboutNewPost");
        assert_eq!(task.payload()["post"], 1);
    }
}
