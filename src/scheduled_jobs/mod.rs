pub mod manager;

pub use manager::{JobKind, JobManager};
