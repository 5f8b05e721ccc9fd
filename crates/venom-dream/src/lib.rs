//! Synthetic experience replay: REM sessions that turn stored knowledge
//! into practice scenarios, attempt them and keep what works.

pub mod config;
pub mod engine;
pub mod extract;
pub mod fragments;
pub mod knowledge;
pub mod lessons;
pub mod report;
pub mod traits;

pub use config::*;
pub use engine::*;
pub use extract::{Verdict, extract_code};
pub use knowledge::InMemoryKnowledgeGraph;
pub use lessons::{InMemoryLessonsStore, JsonlLessonsStore};
pub use report::*;
pub use traits::*;
