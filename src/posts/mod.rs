//! Posts, comments and votes.

pub mod model;
pub mod service;

pub use model::{Comment, Post, PostResponse, PostStatus, Role, User};
pub use service::{InMemoryPostService, PostService};
