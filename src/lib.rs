//! ideaboard: a feedback board server with background notifications.

pub mod config;
pub mod email;
pub mod error;
pub mod posts;
pub mod server;
pub mod services;
pub mod tasks;
pub mod web;
pub mod worker;
