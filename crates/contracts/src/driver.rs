//! CameraDriver trait - camera capability abstraction
//!
//! The capture task consumes a camera only through this interface. Optional
//! capabilities have default bodies that report `Unsupported`, so a driver
//! implements exactly what its hardware can do and nothing is probed at
//! runtime.

use crate::{ControlKind, DriverError, DriverResult, ImageData};

/// Camera driver
///
/// Owned by the single processing task, hence `&mut self` everywhere and
/// `Send` but not `Sync`.
///
/// # Example
///
/// ```ignore
/// let mut camera: Box<dyn CameraDriver> = open_camera();
/// camera.start()?;
/// if camera.supports(ControlKind::Gain) {
///     camera.set_control(ControlKind::Gain, 2.0)?;
/// }
/// while let Some(image) = camera.read()? { /* ... */ }
/// camera.stop()?;
/// ```
pub trait CameraDriver: Send {
    /// Driver name (used for logging)
    fn name(&self) -> &str;

    /// Open the device and begin streaming
    fn start(&mut self) -> DriverResult<()>;

    /// Next frame, or `None` when no frame is ready yet
    fn read(&mut self) -> DriverResult<Option<ImageData>>;

    /// Release the device
    fn stop(&mut self) -> DriverResult<()>;

    /// Native luma plane of the last frame, if the sensor exposes one
    fn luma(&mut self) -> Option<ImageData> {
        None
    }

    /// Whether `set_control(control, ..)` can ever succeed
    fn supports(&self, _control: ControlKind) -> bool {
        false
    }

    /// Apply a control value
    fn set_control(&mut self, control: ControlKind, _value: f64) -> DriverResult<()> {
        Err(DriverError::unsupported(control))
    }

    /// Toggle the driver's own auto-exposure loop
    fn set_auto_exposure(&mut self, _enabled: bool) -> DriverResult<()> {
        Err(DriverError::unsupported_capability("auto_exposure"))
    }
}

impl<D: CameraDriver + ?Sized> CameraDriver for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self) -> DriverResult<()> {
        (**self).start()
    }

    fn read(&mut self) -> DriverResult<Option<ImageData>> {
        (**self).read()
    }

    fn stop(&mut self) -> DriverResult<()> {
        (**self).stop()
    }

    fn luma(&mut self) -> Option<ImageData> {
        (**self).luma()
    }

    fn supports(&self, control: ControlKind) -> bool {
        (**self).supports(control)
    }

    fn set_control(&mut self, control: ControlKind, value: f64) -> DriverResult<()> {
        (**self).set_control(control, value)
    }

    fn set_auto_exposure(&mut self, enabled: bool) -> DriverResult<()> {
        (**self).set_auto_exposure(enabled)
    }
}
