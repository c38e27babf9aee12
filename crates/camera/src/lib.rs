//! # Camera
//!
//! Camera driver implementations behind `contracts::CameraDriver`.
//!
//! Responsibilities:
//! - Synthetic `MockCamera` whose brightness follows bias/gain/shutter, with
//!   injectable motion and faults for tests and dry runs
//! - `ReplayCamera` playing recorded image files from a directory
//!
//! Hardware drivers live outside this workspace and only need to implement
//! the same trait.

pub mod error;
pub mod mock_camera;
pub mod replay_camera;

pub use contracts::CameraDriver;
pub use error::{CameraError, Result};
pub use mock_camera::{MockCamera, MockCameraConfig, MockCameraStats, MockSceneHandle, SceneRect};
pub use replay_camera::{ReplayCamera, ReplayConfig};
