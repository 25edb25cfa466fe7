//! Per-request context extracted from the identity headers, plus the
//! enqueue gate handlers use to hand work to the background queue.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use tracing::{debug, warn};

use super::response::ApiError;
use crate::posts::{Role, User};
use crate::services::Services;
use crate::worker::{Task, WorkerQueue};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub queue: WorkerQueue,
}

impl AppState {
    pub fn new(services: Services, queue: WorkerQueue) -> Self {
        Self { services, queue }
    }
}

/// Everything a handler needs about the current request.
pub struct RequestContext {
    user: Option<User>,
    services: Services,
    queue: WorkerQueue,
}

impl RequestContext {
    /// The signed-in user, or 401.
    pub fn require_user(&self) -> Result<&User, ApiError> {
        self.user.as_ref().ok_or(ApiError::Unauthorized)
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Hand a task to the worker queue without waiting for it.
    ///
    /// A full or closing queue drops the task with a warning; the request
    /// itself still succeeds.
    pub fn enqueue(&self, task: Task) {
        let name = task.name().to_string();
        match self.queue.enqueue(task) {
            Ok(task_id) => debug!(%task_id, task_name = %name, "Task enqueued"),
            Err(e) => warn!(task_name = %name, error = %e, "Dropping task"),
        }
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = user_from_headers(&parts.headers);
        if let Some(user) = &user {
            state.services.posts.upsert_user(user).await;
        }

        Ok(Self {
            user,
            services: state.services.clone(),
            queue: state.queue.clone(),
        })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn user_from_headers(headers: &HeaderMap) -> Option<User> {
    let id = header(headers, USER_ID_HEADER)?;
    let name = header(headers, USER_NAME_HEADER).unwrap_or(id);
    let email = header(headers, USER_EMAIL_HEADER).unwrap_or_default();
    let role = header(headers, USER_ROLE_HEADER)
        .and_then(|r| r.parse::<Role>().ok())
        .unwrap_or(Role::Visitor);
    Some(User::new(id, name, email, role))
}
