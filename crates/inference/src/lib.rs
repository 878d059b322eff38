//! HTTP clients for the two model backends and the frame source.
//!
//! The rest of the system talks to inference through the [`Inference`] and
//! [`FrameStore`] traits so tests can substitute in-process fakes.

pub mod client;
pub mod error;
pub mod frames;

pub use client::{
    BackendHealth, HealthReport, HttpInference, Inference, InferenceConfig,
    CLASSIFIER_BACKEND, REPORT_BACKEND,
};
pub use error::InferenceError;
pub use frames::{FrameStore, HttpFrameStore};
