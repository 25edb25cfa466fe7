//! Background task dispatch.
//!
//! Core components:
//! - `task`: Task type (named closure plus payload)
//! - `context`: TaskContext handed to every execution
//! - `queue`: bounded FIFO shared by the worker pool, with drain-then-stop shutdown
//! - `worker`: worker loop with per-task panic isolation

pub mod context;
pub mod queue;
pub mod task;
pub mod worker;

pub use context::TaskContext;
pub use queue::{QueueStats, WorkerQueue};
pub use task::Task;
