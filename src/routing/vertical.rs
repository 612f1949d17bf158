//! Vertical groundwater balance.
//!
//! Once per coupling sub-step, after the surface router has produced the
//! infiltration accumulators and the subsurface router the lateral
//! deltas, each column merges both, sheds anything above field capacity
//! back to its surface pool, and re-derives its water-table elevation
//! from the porosity profile.

use crate::constants::ZERO;
use crate::parallel::{par_map_indexed, par_update, par_update2};
use crate::routing::state::WorkState;
use crate::topology::RoutingContext;

/// Depth of the water table below the surface for a column missing
/// `deficit` m of water, under an exponential porosity profile
/// `phi(z) = por_0 * exp(-z / por_d)`.
///
/// Inverts the cumulative pore volume `por_0 * por_d * (1 - e^(-d/por_d))`;
/// a decay length of 999.9 or more selects the constant-porosity form
/// `deficit / por_0`. The result is clamped to the soil depth, which also
/// covers deficits beyond the profile's total pore volume.
pub fn water_table_depth(por_0: f64, por_d: f64, soil_depth: f64, deficit: f64) -> f64 {
    if deficit <= 0.0 {
        return 0.0;
    }
    let depth = if por_d < 999.9 {
        let pore_volume = por_0 * por_d;
        if deficit >= pore_volume * (1.0 - (-soil_depth / por_d).exp()) {
            soil_depth
        } else {
            -por_d * (1.0 - deficit / pore_volume).ln()
        }
    } else if por_0 > ZERO {
        deficit / por_0
    } else {
        soil_depth
    };
    depth.min(soil_depth)
}

/// Merge infiltration and lateral inflow into each column and rebalance.
///
/// Columns above field capacity move the excess fraction
/// `fac = (totH2O - capH2O) / totH2O` of all five variables to the
/// surface pool and sit with the water table at the surface; the rest
/// re-derive the water-table elevation from their deficit.
pub fn sub_vertical(ctx: &RoutingContext, work: &mut WorkState) {
    let inf = &work.inf;
    let lat = &work.lat;
    par_update(&mut work.tot, |i, tot| {
        *tot += inf[i] + lat[i];
    });

    par_update2(&mut work.tot, &mut work.sfc, |i, tot, sfc| {
        if tot.h2o > ctx.cap_h2o[i] {
            let fac = (tot.h2o - ctx.cap_h2o[i]) / tot.h2o;
            let excess = *tot * fac;
            *sfc += excess;
            *tot -= excess;
        }
    });

    let tot = &work.tot;
    work.waterz = par_map_indexed(ctx.n_patches, |i| {
        let deficit = ctx.cap_h2o[i] - tot[i].h2o;
        ctx.z[i] - water_table_depth(ctx.por_0[i], ctx.por_d[i], ctx.zsoil[i], deficit)
    });
}
