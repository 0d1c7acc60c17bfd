// Output adapter interface
//
// DESIGN: The hosting loop only sees this trait. Per-event delivery is
// infallible by contract: failures are caught, logged, and dropped inside
// the adapter so one bad event never stalls the loop.

pub mod sumologic;

use crate::config::Config;
use crate::event::Event;
use anyhow::Result;
use async_trait::async_trait;

/// Interface the hosting loop drives, one event at a time, in order.
#[async_trait]
pub trait Output: Send + Sync {
    /// Deliver one event. Never raises; delivery failures are logged and
    /// the event is dropped. The shutdown sentinel makes no HTTP call and
    /// marks the adapter finished.
    async fn send(&self, event: &Event);

    /// True once the shutdown sentinel has been observed.
    fn finished(&self) -> bool;
}

/// Build the configured adapter. Fails fast on setup errors, before any
/// event is processed.
pub fn create_output(config: &Config) -> Result<Box<dyn Output>> {
    Ok(Box::new(sumologic::SumologicOutput::new(config)?))
}
