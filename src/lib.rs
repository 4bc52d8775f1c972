//! # gesture-flow
//!
//! Rule-based hand gesture recognition over 21-point hand landmarks.
//!
//! This crate provides:
//! - **Smoothing**: exponential low-pass filtering of per-frame landmarks
//! - **Classification**: debounced pinch, pinch-hold, spread and pointing
//!   navigation events with cooldown and hold semantics
//! - **Custom gestures**: recording, storing and DTW matching of templates
//! - **Throughput control**: adaptive frame scale and skip to hold a target rate
//!
//! ## Pipeline
//!
//! 1. A landmark source supplies zero or more hands per frame
//! 2. The smoother blends each hand with the previous frame's output
//! 3. The classifier turns the first hand into an optional [`Gesture`]
//! 4. A [`CommandMapper`] resolves the gesture to a [`Command`] for a sink
//!
//! The [`PerformanceController`] sits in front of the landmark source and
//! works on raw camera frames.
//!
//! ## Quick Start
//!
//! ```rust
//! use gesture_flow::{GestureClassifier, Hand, Landmark, Settings, LANDMARK_COUNT};
//!
//! let settings = Settings::default();
//! let mut classifier = GestureClassifier::new(&settings.classifier);
//!
//! // A hand with every landmark at the frame center.
//! let hand = Hand::new(vec![Landmark::new(0.5, 0.5, 0.0); LANDMARK_COUNT]);
//!
//! // Degenerate geometry is "no gesture", never an error.
//! assert_eq!(classifier.update(&[hand]), None);
//! assert_eq!(classifier.rejections().degenerate_base, 1);
//! ```
//!
//! ## Custom Backends
//!
//! Implement [`CommandSink`] to inject OS input, or [`FrameResizer`] to give
//! the performance controller an accelerated resize path:
//!
//! ```rust
//! use gesture_flow::{Command, CommandSink, Hand, Result};
//!
//! struct Printer;
//!
//! impl CommandSink for Printer {
//!     fn execute(&mut self, command: Command, _hand: Option<&Hand>) -> Result<()> {
//!         println!("{}", command);
//!         Ok(())
//!     }
//! }
//! ```

pub mod classifier;
pub mod commands;
pub mod config;
mod error;
pub mod geometry;
pub mod matcher;
pub mod paint;
pub mod performance;
pub mod pipeline;
pub mod smoother;
pub mod source;
pub mod template;
mod types;

pub use classifier::{ClassifierState, Gesture, GestureClassifier, RejectionCounts};
pub use commands::{default_command, Command, CommandMapper, CommandSink, LoggingSink};
pub use config::Settings;
pub use error::{Error, Result};
pub use matcher::{dtw_cost, TemplateMatch, TemplateMatcher};
pub use paint::{PaintTracker, PointerAction};
pub use performance::{
    CpuResizer, FrameResizer, PerformanceController, PerformanceStats, ProcessedFrame,
    SharedController,
};
pub use pipeline::{FrameOutput, GesturePipeline, Mode};
pub use smoother::LandmarkSmoother;
pub use source::{JsonLinesSource, LandmarkSource};
pub use template::{GestureRecorder, GestureTemplate, TemplateStore};
pub use types::*;
