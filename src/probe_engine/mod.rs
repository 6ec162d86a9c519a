mod client;
mod helpers;

pub use client::ProbeClient;

use crate::config::ProbeTarget;
use crate::probe::ProbeResult;

/// A single-request prober owned by one VU.
///
/// Implementations never fail past this boundary: transport problems are
/// reported through [`ProbeResult::error`].
pub trait Probe: Send {
    fn probe(&mut self, target: &ProbeTarget) -> ProbeResult;
}

impl Probe for ProbeClient {
    fn probe(&mut self, target: &ProbeTarget) -> ProbeResult {
        ProbeClient::probe(self, target)
    }
}
