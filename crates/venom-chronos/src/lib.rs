//! Timeline-scoped checkpoint and restore of a git workspace, a memory
//! directory and an environment snapshot.

pub mod config;
pub mod engine;
pub mod fsutil;
pub mod git;

pub use config::*;
pub use engine::*;
pub use git::GitWorkspace;
