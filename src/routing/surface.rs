//! Kinematic-wave overland flow with sorptivity-based infiltration.
//!
//! Per patch the effective head is the detention store above `retdep`:
//!
//! ```text
//! hh  = sfcH2O - retdep
//! vel = sfcknl * hh^(2/3)          (cells/s)
//! d(head)/dt = vel * hh
//! d(chem)/dt = vel * (hh / sfcH2O) * chem
//! ```
//!
//! where `sfcknl = sqrt(tan(slope_max)) / (mannN * sqrt(area))` is the
//! time-independent Manning prefactor. The router runs its own inner
//! adaptive loop inside the coupling sub-step: rates are recomputed each
//! pass, the inner `dt` obeys the Courant bound on the fastest cell, and
//! the inflow-matrix update applies outflow, inflow, and canopy source
//! rates at every destination. After the update each patch infiltrates
//! into its column following a Green-Ampt sorptivity model; species move
//! with the infiltrating water in proportion to surface storage.

use crate::constants::{COUMAX, EPSILON, TWO_THIRDS, ZERO};
use crate::parallel::{par_map_indexed, par_update2};
use crate::routing::state::{Pool, WorkState};
use crate::topology::RoutingContext;

/// Green-Ampt infiltration for one patch over `dt` seconds.
///
/// `z` is the current water-table depth; conductivity and porosity are
/// depth-averaged over `[0, z]` assuming exponential-decay profiles (the
/// surface values apply in the `z -> 0` limit). Returns the infiltrating
/// depth, never more than the available surface water.
#[allow(clippy::too_many_arguments)]
fn green_ampt_depth(
    sfc_h2o: f64,
    z: f64,
    ksat_0: f64,
    mz_v: f64,
    por_0: f64,
    por_d: f64,
    psi_air: f64,
    rootzs: f64,
    ksatv: f64,
    dt: f64,
) -> f64 {
    let ksat = if mz_v > ZERO && z > ZERO {
        mz_v * ksat_0 * (1.0 - (-z / mz_v).exp()) / z
    } else {
        ksat_0
    };
    let poro = if por_d < 999.9 && z > ZERO {
        por_d * por_0 * (1.0 - (-z / por_d).exp()) / z
    } else {
        por_0
    };

    // moisture deficit: S converted to volumetric content
    let theta = rootzs * poro;

    // sorptivity from the wetting-front tension
    let psi_f = 0.76 * psi_air;
    let sorptivity = (2.0 * ksat * psi_f).sqrt();

    let intensity = sfc_h2o / dt;
    let t_ponding = if intensity > ksat {
        ksat * psi_f * (poro - theta) / (intensity * (intensity - ksat))
    } else {
        dt
    };

    // Ksat_vertical limits infiltration to the pervious fraction
    if dt <= t_ponding {
        ksatv * sfc_h2o
    } else {
        let candidate =
            sorptivity * (dt - t_ponding).sqrt() + ksat.powf(1.5) / 3.0 + t_ponding * sfc_h2o;
        ksatv * candidate.min(sfc_h2o)
    }
}

/// Route surface water for `tstep` seconds.
///
/// Resets the infiltration accumulators, then advances the kinematic
/// wave on inner Courant-stable steps until `tstep` is exhausted
/// (to within [`EPSILON`]). Canopy rates in `work.can` are applied as
/// source terms; infiltration drains each patch's surface pool into
/// `work.inf` for the vertical balancer to merge.
pub fn sfc_routing(ctx: &RoutingContext, work: &mut WorkState, tstep: f64) {
    let n = ctx.n_patches;
    work.inf.fill(Pool::ZERO);

    let tfinal = tstep - EPSILON;
    let mut t = 0.0;
    while t < tfinal {
        // Drainage rates, owned by source. A patch below its detention
        // capacity is quiescent.
        let rates: Vec<(Pool, f64)> = par_map_indexed(n, |i| {
            let s = work.sfc[i];
            let hh = s.h2o - ctx.retdep[i];
            if hh > 0.0 && ctx.sfc_cnt_out[i] > 0 {
                let vel = ctx.sfcknl[i] * hh.powf(TWO_THIRDS);
                let div = hh / s.h2o;
                (
                    Pool {
                        h2o: vel * hh,
                        no3: vel * div * s.no3,
                        nh4: vel * div * s.nh4,
                        don: vel * div * s.don,
                        doc: vel * div * s.doc,
                    },
                    vel,
                )
            } else {
                (Pool::ZERO, 0.0)
            }
        });

        let mut cmax = COUMAX / tstep;
        for &(_, vel) in &rates {
            cmax = cmax.max(vel);
        }
        let dt = (COUMAX / cmax).min(tstep - t);

        // Update and infiltrate, owned by destination.
        let can = &work.can;
        let waterz = &work.waterz;
        par_update2(&mut work.sfc, &mut work.inf, |i, sfc, inf| {
            let mut sum = -rates[i].0 + can[i];
            for m in 0..ctx.sfc_cnt_in[i] {
                let k = ctx.sfc_ndx_in[i][m];
                sum += ctx.sfc_gam_in[i][m] * rates[k].0;
            }
            *sfc += sum * dt;

            if ctx.rootzs[i] < 1.0 && ctx.ksat_0[i] > ZERO && sfc.h2o > 0.0 {
                let z = (ctx.z[i] - waterz[i]).max(0.0);
                let delta = green_ampt_depth(
                    sfc.h2o,
                    z,
                    ctx.ksat_0[i],
                    ctx.mz_v[i],
                    ctx.por_0[i],
                    ctx.por_d[i],
                    ctx.psi_air[i],
                    ctx.rootzs[i],
                    ctx.ksatv[i],
                    dt,
                );
                let afac = delta / sfc.h2o;
                let moved = Pool {
                    h2o: delta,
                    no3: afac * sfc.no3,
                    nh4: afac * sfc.nh4,
                    don: afac * sfc.don,
                    doc: afac * sfc.doc,
                };
                *inf += moved;
                *sfc -= moved;
            }
        });

        t += dt;
    }
}
