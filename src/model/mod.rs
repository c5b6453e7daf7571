//! Request and outcome types shared by the pipeline and its callers

pub mod outcome;
pub mod request;

pub use outcome::{ExecutionOutcome, ExecutionStatus, TIME_LIMIT_MESSAGE};
pub use request::ExecutionRequest;
