pub mod config;
pub mod error;
pub mod gait;
pub mod geometry;
pub mod pipeline;
pub mod posture;
pub mod types;
pub mod visibility;

pub use config::{Settings, Timing};
pub use error::{AnalysisError, Result};
pub use pipeline::{AnalysisOutcome, analyze_video};
