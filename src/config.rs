//! # Pipeline configuration.
//!
//! Provides [`PipelineConfig`] centralized settings for the event pipeline.
//!
//! Config is used in two ways:
//! 1. **Bus creation**: `Bus::from_config(&config)` picks the delivery mode.
//! 2. **Discovery**: `DiscoveryDriver::new(source, bus, config)` reads the
//!    source-information flag.
//!
//! ## Delivery modes
//! - [`DeliveryMode::Immediate`] — handlers run on the publishing thread
//!   before `publish` returns; the cancellation signal is synchronous.
//! - [`DeliveryMode::Queued`] — events are drained in FIFO order by one
//!   dedicated worker; `publish` returns at enqueue time, so the
//!   cancellation signal lags and hot loops must also poll
//!   `Bus::is_cancelled`.

/// How the bus hands events to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Handlers run inline on the publishing thread.
    Immediate,
    /// Events are queued and delivered from a dedicated background worker.
    Queued,
}

/// Global configuration for the event pipeline.
///
/// ## Field semantics
/// - `delivery`: bus delivery policy (see [`DeliveryMode`])
/// - `include_source_info`: resolve missing source file/line for discovered
///   test cases when a source provider is available
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Bus delivery policy.
    pub delivery: DeliveryMode,

    /// Whether discovery should resolve missing source information.
    ///
    /// Only consulted when a source provider was attached to the driver;
    /// cases that already carry source information are never overwritten.
    pub include_source_info: bool,
}

impl PipelineConfig {
    /// Returns `true` when publishes report handler cancellation synchronously.
    #[inline]
    pub fn synchronous_reporting(&self) -> bool {
        self.delivery == DeliveryMode::Immediate
    }
}

impl Default for PipelineConfig {
    /// Default configuration:
    ///
    /// - `delivery = DeliveryMode::Queued` (publishers never block on handlers);
    /// - `include_source_info = false`.
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::Queued,
            include_source_info: false,
        }
    }
}
