//! Error types for ideaboard.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid pattern for {key}: {source}")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },
}

/// Worker queue errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker queue is full ({capacity} pending tasks), dropping task {name}")]
    QueueFull { name: String, capacity: usize },

    #[error("Worker queue is shutting down, rejecting task {name}")]
    ShuttingDown { name: String },

    #[error("Worker drain timed out after {timeout:?} with {abandoned} tasks unfinished")]
    DrainTimeout { timeout: Duration, abandoned: usize },

    #[error("Worker queue closed without workers, {abandoned} tasks dropped")]
    NoWorkers { abandoned: usize },
}

/// Failure reported by a task closure.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Post error: {0}")]
    Post(#[from] PostError),
}

/// Email rendering and sending errors.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email template not found: {0}")]
    TemplateNotFound(String),

    #[error("Malformed email template {name}: {reason}")]
    MalformedTemplate { name: String, reason: String },

    #[error("Invalid email address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Failed to send email to {to}: {reason}")]
    SendFailed { to: String, reason: String },
}

/// Post service errors.
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("Post #{number} not found")]
    NotFound { number: u64 },

    #[error("A post with title '{title}' already exists")]
    DuplicateTitle { title: String },

    #[error("Post #{number} cannot be marked as duplicate of itself")]
    SelfDuplicate { number: u64 },

    #[error("User {user_id} is not allowed to {action}")]
    Forbidden { user_id: String, action: String },
}

/// Server lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot {action} while server is {phase}")]
    InvalidPhase { action: String, phase: String },

    #[error("HTTP listener failed: {0}")]
    Listener(String),

    #[error("Graceful shutdown timed out after {timeout:?}")]
    ShutdownTimeout { timeout: Duration },

    #[error("Worker drain failed: {0}")]
    Drain(#[from] WorkerError),

    #[error("Diagnostics unavailable: {0}")]
    Diagnostics(String),

    #[error("Signal registration failed: {0}")]
    Signal(#[from] std::io::Error),
}

