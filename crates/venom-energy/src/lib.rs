//! Resource and idle monitoring with busy alerts for background work.

pub mod alert;
pub mod manager;
pub mod priority;
pub mod sampler;

pub use alert::*;
pub use manager::*;
pub use priority::set_low_priority;
pub use sampler::*;
