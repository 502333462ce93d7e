pub mod error;
pub mod logging;
pub mod retry;

pub use error::{FailedStage, PipelineError};
pub use logging::init_logging;
pub use retry::RetryPolicy;
