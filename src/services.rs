//! Shared service handles, constructed once at startup and injected into
//! request handlers and tasks.

use std::sync::Arc;

use crate::email::Mailer;
use crate::posts::PostService;

/// Public identity of the site, used in notification content.
#[derive(Debug, Clone)]
pub struct Site {
    pub name: String,
    pub base_url: String,
}

impl Site {
    pub fn post_link(&self, number: u64, slug: &str) -> String {
        format!("{}/posts/{number}/{slug}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Clone)]
pub struct Services {
    pub posts: Arc<dyn PostService>,
    pub mailer: Arc<Mailer>,
    pub site: Arc<Site>,
}

impl Services {
    pub fn new(posts: Arc<dyn PostService>, mailer: Arc<Mailer>, site: Site) -> Self {
        Self {
            posts,
            mailer,
            site: Arc::new(site),
        }
    }
}
