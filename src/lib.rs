//! Classroom engagement monitoring: webcam frames in, smoothed engagement
//! metrics out.

pub mod api;
pub mod camera;
pub mod config;
pub mod detector;
pub mod error;
pub mod sampler;
pub mod scoring;
pub mod session;
pub mod state;
