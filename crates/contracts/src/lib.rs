//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the camera service:
//! frame and detection types, exposure/control state, the published snapshot,
//! the camera driver capability trait, the arming gate and the save sink.
//! Business crates depend on this crate only, never on each other's internals.
//!
//! ## Time Model
//! - Monotonic service clock in seconds (f64), measured from service start
//! - `frame_id` is a per-session capture counter, used for ordering/diagnostics

mod config;
mod control;
mod detection;
mod driver;
mod error;
mod exposure;
mod frame;
mod gate;
mod sink;
mod snapshot;

pub use config::*;
pub use control::*;
pub use detection::*;
pub use driver::CameraDriver;
pub use error::*;
pub use exposure::*;
pub use frame::*;
pub use gate::*;
pub use sink::*;
pub use snapshot::*;
