//! Analyze → confirm → convert → deliver.
//!
//! A [`Session`] owns the session-scoped resources (the lazily loaded
//! engine, the probe, the format catalog and the blob store). A
//! [`PipelineController`] drives one file at a time through the
//! [`PipelineState`] machine on top of a session and publishes
//! [`PipelineEvent`]s for whoever renders it.
//!
//! # Example
//!
//! ```rust,ignore
//! let session = Arc::new(Session::from_config(&config)?);
//! let mut controller = PipelineController::new(session);
//!
//! let file = SourceFile::open("holiday.mp4", None).await?;
//! controller.drop_file(file).await?;
//! if controller.can_convert() {
//!     let result = controller.convert().await?;
//!     println!("{} -> {}", result.filename, result.blob);
//! }
//! controller.reset().await;
//! ```

mod controller;
mod error;
mod session;
mod types;

pub use controller::PipelineController;
pub use error::{PipelineError, INVALID_INPUT_MESSAGE};
pub use session::{Session, SessionBuilder};
pub use types::{
    loading_steps, step, ConversionResult, LoadingStep, PipelineEvent, PipelineState, ReadyInfo,
    StepStatus,
};
