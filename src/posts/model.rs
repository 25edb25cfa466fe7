//! Post data model: users, posts, statuses and comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a user within the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Visitor,
    Collaborator,
    Administrator,
}

impl Role {
    /// Collaborators and administrators can respond to posts.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Collaborator | Self::Administrator)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visitor" | "" => Ok(Self::Visitor),
            "collaborator" => Ok(Self::Collaborator),
            "administrator" | "admin" => Ok(Self::Administrator),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub email: String,
    pub role: Role,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

/// Lifecycle status of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Open,
    Started,
    Completed,
    Declined,
    Planned,
    Duplicate,
    Deleted,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Declined => "declined",
            Self::Planned => "planned",
            Self::Duplicate => "duplicate",
            Self::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "started" => Ok(Self::Started),
            "completed" => Ok(Self::Completed),
            "declined" => Ok(Self::Declined),
            "planned" => Ok(Self::Planned),
            "duplicate" => Ok(Self::Duplicate),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Staff response attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub text: String,
    pub responded_by: User,
    pub responded_at: DateTime<Utc>,
    /// Number of the original post when marked as duplicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_number: Option<u64>,
}

/// A feedback post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub number: u64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub author: User,
    pub status: PostStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<PostResponse>,
    pub votes_count: usize,
    pub comments_count: usize,
    pub created_at: DateTime<Utc>,
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub post_number: u64,
    pub content: String,
    pub author: User,
    pub created_at: DateTime<Utc>,
}

/// URL-friendly form of a title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
