//! Stream-network routing seam.
//!
//! The core hands each coupling sub-step to a [`StreamRouter`] after
//! surface routing and before the vertical balance. A real implementation
//! scavenges the lateral inflow targeted at stream-labelled patches
//! (`RoutingContext::stream`), applies baseflow accounting along the
//! network, and returns any overflow to the corresponding surface pools.
//! Basins without stream edges route correctly with [`NoStream`].

use crate::routing::state::WorkState;
use crate::topology::RoutingContext;

/// Network router invoked once per coupling sub-step.
pub trait StreamRouter {
    /// Process `substep` seconds of stream transport.
    ///
    /// Implementations may drain `work.lat` entries at stream patches,
    /// adjust baseflow state of their own, and add overflow back into
    /// `work.sfc`.
    fn route(&mut self, ctx: &RoutingContext, substep: f64, work: &mut WorkState);
}

/// No stream network: every sub-step is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStream;

impl StreamRouter for NoStream {
    fn route(&mut self, _ctx: &RoutingContext, _substep: f64, _work: &mut WorkState) {}
}
