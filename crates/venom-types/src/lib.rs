pub mod checkpoint;
pub mod dream;
pub mod error;
pub mod lesson;
pub mod metrics;
pub mod outcome;
pub mod scenario;

pub use checkpoint::*;
pub use dream::*;
pub use error::*;
pub use lesson::*;
pub use metrics::*;
pub use outcome::*;
pub use scenario::*;
