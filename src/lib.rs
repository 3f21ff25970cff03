pub mod audio;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod mux;
pub mod pipeline;
pub mod subtitle;
pub mod transcoder;
pub mod transcribe;
pub mod translate;

pub use config::Config;
pub use error::{AutosubError, Result};
pub use pipeline::{
    print_summary, resolve_inputs, Failure, Pipeline, PipelineConfig, PipelineRun, RunItem, Stage,
};
