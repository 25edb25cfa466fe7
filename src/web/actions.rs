//! Request bodies and their validation.

use serde::Deserialize;

use super::response::{ApiError, FieldError};
use crate::posts::PostStatus;

const TITLE_MIN_CHARS: usize = 10;
const TITLE_MAX_CHARS: usize = 100;

fn finish(errors: Vec<FieldError>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

fn check_title(title: &str, errors: &mut Vec<FieldError>) {
    let chars = title.trim().chars().count();
    if chars == 0 {
        errors.push(FieldError::new("title", "Title is required."));
    } else if chars < TITLE_MIN_CHARS {
        errors.push(FieldError::new("title", "Title needs to be more descriptive."));
    } else if chars > TITLE_MAX_CHARS {
        errors.push(FieldError::new(
            "title",
            format!("Title must have less than {TITLE_MAX_CHARS} characters."),
        ));
    }
}

/// Body of `POST /api/v1/posts`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostInput {
    pub title: String,
    pub description: String,
}

impl PostInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        check_title(&self.title, &mut errors);
        finish(errors)
    }
}

/// Body of `PUT /api/v1/posts/{number}/status`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetResponse {
    pub status: String,
    pub text: String,
    pub original_number: Option<u64>,
}

impl SetResponse {
    /// Parsed status, once the body is consistent.
    pub fn validate(&self, number: u64) -> Result<PostStatus, ApiError> {
        let status = match self.status.parse::<PostStatus>() {
            Ok(PostStatus::Deleted) => {
                return Err(ApiError::field("status", "Posts cannot be deleted here."));
            }
            Ok(status) => status,
            Err(e) => return Err(ApiError::field("status", e)),
        };

        if status == PostStatus::Duplicate {
            match self.original_number {
                None => return Err(ApiError::field("originalNumber", "Original post is required.")),
                Some(original) if original == number => {
                    return Err(ApiError::field(
                        "originalNumber",
                        "Cannot be a duplicate of itself.",
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(status)
    }
}

/// Body of `POST /api/v1/posts/{number}/comments`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentInput {
    pub content: String,
}

impl CommentInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        if self.content.trim().is_empty() {
            errors.push(FieldError::new("content", "Comment is required."));
        }
        finish(errors)
    }
}
