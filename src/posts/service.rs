//! Post service: trait seam for the persistence collaborator plus an
//! in-memory implementation.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::model::{Comment, Post, PostResponse, PostStatus, User, slugify};
use crate::error::PostError;

/// Domain operations on posts of the current site.
#[async_trait]
pub trait PostService: Send + Sync {
    /// Remember a user so staff lookups can find them.
    async fn upsert_user(&self, user: &User);
    async fn staff(&self) -> Vec<User>;

    async fn get_by_number(&self, number: u64) -> Result<Post, PostError>;
    async fn add(&self, title: &str, description: &str, author: &User) -> Result<Post, PostError>;
    async fn set_response(
        &self,
        number: u64,
        text: &str,
        status: PostStatus,
        actor: &User,
    ) -> Result<Post, PostError>;
    async fn mark_as_duplicate(
        &self,
        number: u64,
        original: u64,
        actor: &User,
    ) -> Result<Post, PostError>;

    async fn add_comment(
        &self,
        number: u64,
        content: &str,
        author: &User,
    ) -> Result<Comment, PostError>;

    async fn add_vote(&self, number: u64, user: &User) -> Result<(), PostError>;
    async fn subscribers(&self, number: u64) -> Result<Vec<User>, PostError>;
}

struct PostRecord {
    post: Post,
    voters: HashSet<String>,
    subscribers: HashSet<String>,
}

#[derive(Default)]
struct State {
    posts: BTreeMap<u64, PostRecord>,
    users: HashMap<String, User>,
    last_post: u64,
    last_comment: u64,
}

impl State {
    fn record(&self, number: u64) -> Result<&PostRecord, PostError> {
        self.posts
            .get(&number)
            .filter(|r| r.post.status != PostStatus::Deleted)
            .ok_or(PostError::NotFound { number })
    }

    fn record_mut(&mut self, number: u64) -> Result<&mut PostRecord, PostError> {
        self.posts
            .get_mut(&number)
            .filter(|r| r.post.status != PostStatus::Deleted)
            .ok_or(PostError::NotFound { number })
    }

    fn remember(&mut self, user: &User) {
        self.users.insert(user.id.clone(), user.clone());
    }

    fn slug_taken(&self, slug: &str) -> bool {
        self.posts
            .values()
            .any(|r| r.post.status != PostStatus::Deleted && r.post.slug == slug)
    }
}

fn forbidden(actor: &User, action: &str) -> PostError {
    PostError::Forbidden {
        user_id: actor.id.clone(),
        action: action.to_string(),
    }
}

/// Post service holding everything in process memory.
#[derive(Default)]
pub struct InMemoryPostService {
    state: RwLock<State>,
}

impl InMemoryPostService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostService for InMemoryPostService {
    async fn upsert_user(&self, user: &User) {
        self.state.write().await.remember(user);
    }

    async fn staff(&self) -> Vec<User> {
        let state = self.state.read().await;
        let mut staff: Vec<User> = state.users.values().filter(|u| u.is_staff()).cloned().collect();
        staff.sort_by(|a, b| a.id.cmp(&b.id));
        staff
    }

    async fn get_by_number(&self, number: u64) -> Result<Post, PostError> {
        Ok(self.state.read().await.record(number)?.post.clone())
    }

    async fn add(&self, title: &str, description: &str, author: &User) -> Result<Post, PostError> {
        let mut state = self.state.write().await;
        let slug = slugify(title);
        if state.slug_taken(&slug) {
            return Err(PostError::DuplicateTitle {
                title: title.to_string(),
            });
        }

        state.remember(author);
        state.last_post += 1;
        let post = Post {
            number: state.last_post,
            slug,
            title: title.to_string(),
            description: description.to_string(),
            author: author.clone(),
            status: PostStatus::Open,
            response: None,
            votes_count: 0,
            comments_count: 0,
            created_at: Utc::now(),
        };
        state.posts.insert(
            post.number,
            PostRecord {
                post: post.clone(),
                voters: HashSet::new(),
                subscribers: HashSet::from([author.id.clone()]),
            },
        );

        info!(number = post.number, author = %author.id, "Post created");
        Ok(post)
    }

    async fn set_response(
        &self,
        number: u64,
        text: &str,
        status: PostStatus,
        actor: &User,
    ) -> Result<Post, PostError> {
        if !actor.is_staff() {
            return Err(forbidden(actor, "respond to posts"));
        }
        let mut state = self.state.write().await;
        state.remember(actor);
        let record = state.record_mut(number)?;
        record.post.status = status;
        record.post.response = Some(PostResponse {
            text: text.to_string(),
            responded_by: actor.clone(),
            responded_at: Utc::now(),
            original_number: None,
        });

        info!(number, status = %status, responder = %actor.id, "Post response set");
        Ok(record.post.clone())
    }

    async fn mark_as_duplicate(
        &self,
        number: u64,
        original: u64,
        actor: &User,
    ) -> Result<Post, PostError> {
        if !actor.is_staff() {
            return Err(forbidden(actor, "respond to posts"));
        }
        if number == original {
            return Err(PostError::SelfDuplicate { number });
        }
        let mut state = self.state.write().await;
        state.record(original)?;

        let record = state.record_mut(number)?;
        record.post.status = PostStatus::Duplicate;
        record.post.response = Some(PostResponse {
            text: String::new(),
            responded_by: actor.clone(),
            responded_at: Utc::now(),
            original_number: Some(original),
        });
        let voters: Vec<String> = record.voters.iter().cloned().collect();
        let post = record.post.clone();

        // Voters of the duplicate back the original instead.
        let original_record = state.record_mut(original)?;
        for voter in voters {
            original_record.subscribers.insert(voter.clone());
            if original_record.voters.insert(voter) {
                original_record.post.votes_count += 1;
            }
        }

        info!(number, original, "Post marked as duplicate");
        Ok(post)
    }

    async fn add_comment(
        &self,
        number: u64,
        content: &str,
        author: &User,
    ) -> Result<Comment, PostError> {
        let mut state = self.state.write().await;
        state.remember(author);
        state.record(number)?;
        state.last_comment += 1;
        let comment = Comment {
            id: state.last_comment,
            post_number: number,
            content: content.to_string(),
            author: author.clone(),
            created_at: Utc::now(),
        };

        let record = state.record_mut(number)?;
        record.post.comments_count += 1;
        record.subscribers.insert(author.id.clone());

        debug!(number, comment_id = comment.id, "Comment added");
        Ok(comment)
    }

    async fn add_vote(&self, number: u64, user: &User) -> Result<(), PostError> {
        let mut state = self.state.write().await;
        state.remember(user);
        let record = state.record_mut(number)?;
        if record.voters.insert(user.id.clone()) {
            record.post.votes_count += 1;
        }
        record.subscribers.insert(user.id.clone());
        Ok(())
    }

    async fn subscribers(&self, number: u64) -> Result<Vec<User>, PostError> {
        let state = self.state.read().await;
        let record = state.record(number)?;
        let mut users: Vec<User> = record
            .subscribers
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }
}
