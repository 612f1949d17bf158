//! Horizontal groundwater routing and the coupling sub-step.
//!
//! Outflow rates are computed owned-by-source from water-table slopes and
//! the transmissivity at the current saturation deficit; the Courant
//! condition on the fastest cell velocity then fixes the coupling
//! sub-step for the whole sequence of routers; finally the lateral deltas
//! are accumulated owned-by-destination through the subsurface inflow
//! matrix. Species leave each column in proportion to the water that
//! leaves it, partitioned across edges by relative slope.

use crate::constants::{COUMAX, CPL_MAX, MAX_NEIGHBORS, QUAD_NODES, QUAD_WEIGHTS, ZERO};
use crate::parallel::{par_map_indexed, par_update};
use crate::routing::state::{Pool, WorkState};
use crate::topology::RoutingContext;

/// Source-owned per-edge rates for one patch.
#[derive(Clone, Copy)]
struct EdgeRates {
    /// Water outflow rate per edge (m/s).
    rate: [f64; MAX_NEIGHBORS],
    /// Slope-normalized partition per edge; sums to 1 over active edges.
    gamma: [f64; MAX_NEIGHBORS],
    /// Total water outflow rate (m/s).
    wsum: f64,
    /// Fastest edge velocity (cells/s).
    vmax: f64,
}

impl EdgeRates {
    const DORMANT: Self = Self {
        rate: [0.0; MAX_NEIGHBORS],
        gamma: [0.0; MAX_NEIGHBORS],
        wsum: 0.0,
        vmax: 0.0,
    };
}

/// Transmissivity at the water table for every patch.
///
/// Patches with microtopographic spread (`pscale > 0`) integrate the
/// profile over a 9-point quadrature of the saturation deficit; the rest
/// evaluate it at the deterministic index. Indices are clamped to
/// `[0, nsoil]`.
fn transmissivities(ctx: &RoutingContext, work: &WorkState) -> Vec<f64> {
    par_map_indexed(ctx.n_patches, |i| {
        let sat_def = ctx.cap_h2o[i] - work.tot[i].h2o;
        let profile = &ctx.trans_profile[i];
        let lookup = |deficit: f64| {
            let n = (deficit / ctx.dzsoil[i]).round() as i64;
            profile[n.clamp(0, ctx.nsoil[i] as i64) as usize]
        };
        if ctx.pscale[i] > 0.0 {
            QUAD_NODES
                .iter()
                .zip(QUAD_WEIGHTS.iter())
                .map(|(node, w)| w * lookup(sat_def + node * ctx.pscale[i]))
                .sum()
        } else {
            lookup(sat_def)
        }
    })
}

/// Route subsurface water laterally for at most `tstep` seconds.
///
/// Fills `work.lat` with the per-patch deltas for water and each species
/// and returns the Courant-stable coupling sub-step
/// `substep <= min(tstep, CPL_MAX)` that those deltas are valid for.
///
/// A column with no water (`totH2O <= ZERO`) is dormant: it emits zero
/// rate on every edge, so no division by the column total can occur and
/// its neighbors may still flow into it.
pub fn sub_routing(ctx: &RoutingContext, work: &mut WorkState, tstep: f64) -> f64 {
    let n = ctx.n_patches;
    let trans = transmissivities(ctx, work);

    // Per-edge outflow rates, owned by source.
    let rates: Vec<EdgeRates> = par_map_indexed(n, |i| {
        if work.tot[i].h2o <= ZERO {
            return EdgeRates::DORMANT;
        }
        let mut r = EdgeRates::DORMANT;
        let z1 = work.waterz[i];
        let mut gsum = 0.0;
        for j in 0..ctx.sub_cnt_out[i] {
            let k = ctx.sub_ndx_out[i][j];
            let z2 = work.waterz[k];
            let slope = (z1 - z2) / ctx.sub_dist[i][j];
            if slope > ZERO {
                let zz = 0.5 * (z1 + z2);
                let vel = slope * trans[i] / ctx.psize[i]; // cells/s
                r.gamma[j] = slope;
                r.rate[j] = ctx.sub_perimf[i][j] * zz * vel;
                gsum += slope;
                r.wsum += r.rate[j];
                if vel > r.vmax {
                    r.vmax = vel;
                }
            }
        }
        if gsum > ZERO {
            let inv = 1.0 / gsum;
            for g in r.gamma.iter_mut().take(ctx.sub_cnt_out[i]) {
                *g *= inv;
            }
        }
        r
    });

    // Courant-stable sub-step, seeded so that dt never exceeds CPL_MAX.
    let mut cmax = COUMAX / tstep.min(CPL_MAX);
    for r in &rates {
        cmax = cmax.max(r.vmax);
    }
    let dt = (COUMAX / cmax).min(tstep);

    // Fraction of each column leaving in total and per edge.
    let leaving: Vec<(f64, [f64; MAX_NEIGHBORS])> = par_map_indexed(n, |i| {
        let tot = work.tot[i].h2o;
        let mut rte = [0.0; MAX_NEIGHBORS];
        if tot <= ZERO {
            return (0.0, rte);
        }
        let fac = dt / tot;
        for j in 0..ctx.sub_cnt_out[i] {
            rte[j] = fac * rates[i].gamma[j] * rates[i].rate[j];
        }
        (fac * rates[i].wsum, rte)
    });

    // Deltas, owned by destination through the inflow matrix. Species
    // arrive in proportion to the source column's totals.
    let tot = &work.tot;
    par_update(&mut work.lat, |i, lat| {
        let outfac = leaving[i].0;
        let mut d = Pool {
            h2o: -rates[i].wsum * dt,
            no3: -outfac * tot[i].no3,
            nh4: -outfac * tot[i].nh4,
            don: -outfac * tot[i].don,
            doc: -outfac * tot[i].doc,
        };
        for m in 0..ctx.sub_cnt_in[i] {
            let k = ctx.sub_ndx_in[i][m];
            let j = ctx.sub_slot_in[i][m];
            let rte = leaving[k].1[j];
            d.h2o += rates[k].rate[j] * dt;
            d.no3 += rte * tot[k].no3;
            d.nh4 += rte * tot[k].nh4;
            d.don += rte * tot[k].don;
            d.doc += rte * tot[k].doc;
        }
        *lat = d;
    });

    dt
}
