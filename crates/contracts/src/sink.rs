//! FrameSink trait - save callback interface
//!
//! Receives frames that triggered a detection. Retention and file naming are
//! the sink's business.

use crate::{ContractError, Frame, Region};

/// A detection worth keeping
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub frame: Frame,
    pub regions: Vec<Region>,
}

/// Save output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(FrameSink: Send)]
pub trait LocalFrameSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Persist one detection
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn save(&mut self, request: &SaveRequest) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
