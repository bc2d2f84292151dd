//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend only on this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - A `Record` is one opaque, immutable event payload
//! - A `Batch` is the ordered run of records collected in one window
//! - A `BatchSink` durably writes a detached batch

mod batch;
mod blueprint;
mod error;
mod sink;

pub use batch::*;
pub use blueprint::*;
pub use error::*;
pub use sink::*;
