//! # Reverie Common
//!
//! Common types shared by the Reverie audio crates.
//!
//! This crate provides:
//! - ID types (LevelId, NodeId, SubscriptionId, TaskId)
//! - The top-level error type for data loading and the level model
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;
