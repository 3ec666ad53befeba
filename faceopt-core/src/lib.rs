//! # faceopt-core
//!
//! Core library for faceopt - a simulated optimization workflow for a
//! RetinaFace-Ghost / MobileNetV3 face-detection model.
//!
//! Nothing here trains or runs a model. The library provides:
//! - Domain types for sessions, steps, configurations and results
//! - A [`JobRunner`] that walks a session through the step catalog, streaming
//!   log lines and progress
//! - A [`SessionBroadcaster`] delivering every state change to subscribers
//! - A [`SessionView`] adapter for presentation layers
//! - Configuration import/export, comparison board, detection simulator
//! - Configuration management and logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use faceopt_core::{JobRunner, OptimizationConfig, SessionView};
//!
//! # async fn demo() -> faceopt_core::Result<()> {
//! let runner = JobRunner::builder().build()?;
//! let view = SessionView::attach(&runner);
//!
//! view.request_start(OptimizationConfig::default());
//! runner.wait().await;
//!
//! let session = view.session().expect("session was started");
//! println!("{}: {:?}", session.status, session.results);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use broadcast::{SessionBroadcaster, Subscription};
pub use clock::{Clock, SystemClock, VirtualClock};
pub use config::{Config, RunnerConfig};
pub use error::{Error, Result};
pub use runner::{JobRunner, JobRunnerBuilder, CANCELLED_MESSAGE};
pub use synth::{FixedSynthesizer, RandomSynthesizer, ResultSynthesizer};
pub use types::*;
pub use view::SessionView;

// Public modules
pub mod broadcast;
pub mod catalog;
pub mod clock;
pub mod comparison;
pub mod config;
pub mod dataset;
pub mod detection;
pub mod error;
pub mod logging;
pub mod runner;
pub mod synth;
pub mod transfer;
pub mod types;
pub mod view;
