//! Canopy and precipitation source rates for the surface router.
//!
//! The routing core only needs the five per-patch arrays in
//! [`WorkState::can`](crate::routing::state::WorkState) to hold rates per
//! unit time for the coming sub-step. How those rates arise (throughfall,
//! canopy drip, direct precipitation) is the business of an external
//! ecohydrology package, reached through the [`CanopyForcing`] seam.

use crate::parallel::par_update;
use crate::routing::state::Pool;
use crate::topology::RoutingContext;

/// Producer of per-patch surface source rates.
pub trait CanopyForcing {
    /// Superimpose rates (per second) for the coming `substep` onto the
    /// zeroed per-patch array.
    fn rates(&self, ctx: &RoutingContext, substep: f64, can: &mut [Pool]);
}

/// No canopy sources; the rate arrays stay zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCanopy;

impl CanopyForcing for NoCanopy {
    fn rates(&self, _ctx: &RoutingContext, _substep: f64, _can: &mut [Pool]) {}
}

/// The same source rate on every patch.
///
/// Enough to drive tests and simple storm scenarios; a real producer
/// distributes per-stratum throughfall instead.
#[derive(Clone, Copy, Debug)]
pub struct UniformThroughfall {
    /// Rate per second applied to every patch.
    pub rate: Pool,
}

impl CanopyForcing for UniformThroughfall {
    fn rates(&self, _ctx: &RoutingContext, _substep: f64, can: &mut [Pool]) {
        let rate = self.rate;
        par_update(can, |_i, c| *c = rate);
    }
}

/// Zero the canopy rate arrays, then let the forcing superimpose its
/// rates for the coming sub-step.
pub fn can_routing<F: CanopyForcing>(
    ctx: &RoutingContext,
    forcing: &F,
    substep: f64,
    can: &mut [Pool],
) {
    can.fill(Pool::ZERO);
    forcing.rates(ctx, substep, can);
}

/// Vegetation classes distinguished by the interception model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VegType {
    Vegetated,
    NonVeg,
}

/// Canopy stratum state consumed by [`potential_snow_interception`].
#[derive(Clone, Copy, Debug)]
pub struct CanopyStratum {
    /// Fraction of sky visible through the canopy, in [0, 1].
    pub gap_fraction: f64,
    /// All-sided plant area index (m2 plant / m2 ground).
    pub all_pai: f64,
    /// Snow storage capacity per unit plant area (m).
    pub specific_snow_capacity: f64,
    /// Snow already held by the stratum (m).
    pub snow_stored: f64,
    pub veg_type: VegType,
}

/// Snow depth a stratum can still intercept out of today's snowfall (m).
///
/// The interceptible amount is the smaller of what falls within the
/// canopy's footprint (`(1 - gap_fraction) * snow` for vegetated strata)
/// and the remaining storage capacity. Intercepted snow may later drip or
/// sublimate; that is decided elsewhere.
pub fn potential_snow_interception(snow: f64, stratum: &CanopyStratum) -> f64 {
    let potential = match stratum.veg_type {
        VegType::Vegetated => {
            let coef = 1.0 - stratum.gap_fraction;
            (coef * snow)
                .min(stratum.all_pai * stratum.specific_snow_capacity - stratum.snow_stored)
        }
        VegType::NonVeg => snow.min(stratum.specific_snow_capacity - stratum.snow_stored),
    };
    potential.max(0.0)
}
