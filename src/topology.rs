//! Drainage-graph topology and time-independent routing factors.
//!
//! Built once per basin, the [`RoutingContext`] holds dense per-patch
//! copies of every time-independent quantity the routers touch, plus the
//! outflow tables and their **inflow-matrix** inversions.
//!
//! The inflow matrices are what make the state updates race-free: outflow
//! rates are computed owned-by-source, but the update at each destination
//! reads through that destination's inflow list, so exactly one worker
//! ever writes a given patch. Switching to source-owned pushes would
//! reintroduce the race this layout exists to remove.
//!
//! For each destination R the surface table stores
//! `gam_in(R, m) = gamma_hat(S, R) * area(S) / area(R)`, so the update
//! `head(R) += dt * sum_m gam_in(R, m) * dhead_dt(S_m)` is mass-correct.
//! Subsurface inflow entries carry `(source patch, source edge slot)`
//! pairs so the update loop can read the source-owned per-edge rate
//! directly.

use thiserror::Error;

use crate::basin::Basin;
use crate::constants::{MAX_NEIGHBORS, ZERO};

/// Fixed-width row of neighbor indices.
pub type NeighborRow = [usize; MAX_NEIGHBORS];
/// Fixed-width row of per-edge factors.
pub type FactorRow = [f64; MAX_NEIGHBORS];

/// Perimeter factor for an edge classified as axis-aligned.
const AXIS_FACTOR: f64 = 0.5;
/// Perimeter factor for a diagonal edge.
const DIAG_FACTOR: f64 = 0.353_553_390_593_273_8; // 0.5 * sqrt(0.5)

/// Errors detected while building the routing context.
///
/// These are configuration errors: the drainage graph or soil profiles
/// handed in cannot be routed. Nothing here is recoverable by the router
/// itself.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("basin has no patches")]
    EmptyBasin,

    #[error("patch {patch}: neighbor index {neighbor} out of range (basin has {n_patches} patches)")]
    BadNeighbor {
        patch: usize,
        neighbor: usize,
        n_patches: usize,
    },

    #[error("patch {patch}: {count} outflow neighbors exceeds MAX_NEIGHBORS = {max}; raise MAX_NEIGHBORS and recompile")]
    TooManyOutflows {
        patch: usize,
        count: usize,
        max: usize,
    },

    #[error("patch {patch}: inflow table overflow, more than MAX_NEIGHBORS = {max} sources drain into it; raise MAX_NEIGHBORS and recompile")]
    TooManyInflows { patch: usize, max: usize },

    #[error("patch {patch}: surface outflow weights sum to zero")]
    ZeroOutflowWeights { patch: usize },

    #[error("patch {patch}: coincides with subsurface neighbor {neighbor}")]
    ZeroDistance { patch: usize, neighbor: usize },

    #[error("patch {patch}: transmissivity profile has {got} entries, expected {expected}")]
    ProfileLength {
        patch: usize,
        got: usize,
        expected: usize,
    },
}

/// Time-independent per-patch and per-edge routing factors.
///
/// Read-only after construction; freely shared across the parallel loops.
#[derive(Clone, Debug)]
pub struct RoutingContext {
    pub n_patches: usize,
    /// Sum of patch areas (m2).
    pub basin_area: f64,

    // --- per-patch scalars ---
    pub area: Vec<f64>,
    /// Surface elevation (m).
    pub z: Vec<f64>,
    /// Cell size `sqrt(area)` (m).
    pub psize: Vec<f64>,
    /// Microtopography spread: `std_scale * patch.std`.
    pub pscale: Vec<f64>,
    /// Kinematic-wave prefactor `sqrt(tan(slope_max)) / (mannN * psize)`.
    pub sfcknl: Vec<f64>,
    /// Detention-store capacity (m).
    pub retdep: Vec<f64>,
    /// Root-zone (or column) saturation fraction.
    pub rootzs: Vec<f64>,
    /// Pervious-area fraction limiting infiltration.
    pub ksatv: Vec<f64>,
    /// Surface vertical conductivity (m/s).
    pub ksat_0: Vec<f64>,
    /// Conductivity-profile decay length (m).
    pub mz_v: Vec<f64>,
    /// Surface porosity.
    pub por_0: Vec<f64>,
    /// Porosity-profile decay length (m).
    pub por_d: Vec<f64>,
    /// Air-entry tension (m).
    pub psi_air: Vec<f64>,
    /// Soil depth (m).
    pub zsoil: Vec<f64>,
    /// Number of vertical soil intervals.
    pub nsoil: Vec<usize>,
    /// Interval thickness (m).
    pub dzsoil: Vec<f64>,
    /// Column water at field capacity (m).
    pub cap_h2o: Vec<f64>,
    /// Transmissivity lookup, `nsoil + 1` entries per patch.
    pub trans_profile: Vec<Vec<f64>>,
    /// Stream-network membership, consumed by stream routers.
    pub stream: Vec<bool>,

    // --- surface tables ---
    /// Number of surface outflow neighbors per source; a patch with none
    /// is a surface sink and keeps its ponded water.
    pub sfc_cnt_out: Vec<usize>,
    pub sfc_cnt_in: Vec<usize>,
    pub sfc_ndx_in: Vec<NeighborRow>,
    pub sfc_gam_in: Vec<FactorRow>,

    // --- subsurface outflow tables (owned by source) ---
    pub sub_cnt_out: Vec<usize>,
    pub sub_ndx_out: Vec<NeighborRow>,
    /// Geometric exchange factor per edge: `0.5 * areaS / areaR`, with the
    /// extra `sqrt(0.5)` for diagonal edges.
    pub sub_perimf: Vec<FactorRow>,
    /// Horizontal separation per edge (m).
    pub sub_dist: Vec<FactorRow>,

    // --- subsurface inflow matrix (owned by destination) ---
    pub sub_cnt_in: Vec<usize>,
    /// Source patch per inflow entry.
    pub sub_ndx_in: Vec<NeighborRow>,
    /// The slot of that source's outflow table pointing here.
    pub sub_slot_in: Vec<NeighborRow>,
}

impl RoutingContext {
    /// Build the context from a basin.
    ///
    /// `std_scale` multiplies each patch's microtopographic standard
    /// deviation before it enters the transmissivity quadrature.
    ///
    /// Construction is O(patches + edges). All per-edge factors and both
    /// inflow inversions are computed here and never mutated afterwards.
    pub fn build(basin: &Basin, std_scale: f64) -> Result<Self, TopologyError> {
        let n = basin.len();
        if n == 0 {
            return Err(TopologyError::EmptyBasin);
        }

        let mut ctx = Self {
            n_patches: n,
            basin_area: 0.0,
            area: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
            psize: Vec::with_capacity(n),
            pscale: Vec::with_capacity(n),
            sfcknl: Vec::with_capacity(n),
            retdep: Vec::with_capacity(n),
            rootzs: Vec::with_capacity(n),
            ksatv: Vec::with_capacity(n),
            ksat_0: Vec::with_capacity(n),
            mz_v: Vec::with_capacity(n),
            por_0: Vec::with_capacity(n),
            por_d: Vec::with_capacity(n),
            psi_air: Vec::with_capacity(n),
            zsoil: Vec::with_capacity(n),
            nsoil: Vec::with_capacity(n),
            dzsoil: Vec::with_capacity(n),
            cap_h2o: Vec::with_capacity(n),
            trans_profile: Vec::with_capacity(n),
            stream: Vec::with_capacity(n),
            sfc_cnt_out: vec![0; n],
            sfc_cnt_in: vec![0; n],
            sfc_ndx_in: vec![[0; MAX_NEIGHBORS]; n],
            sfc_gam_in: vec![[0.0; MAX_NEIGHBORS]; n],
            sub_cnt_out: vec![0; n],
            sub_ndx_out: vec![[0; MAX_NEIGHBORS]; n],
            sub_perimf: vec![[0.0; MAX_NEIGHBORS]; n],
            sub_dist: vec![[0.0; MAX_NEIGHBORS]; n],
            sub_cnt_in: vec![0; n],
            sub_ndx_in: vec![[0; MAX_NEIGHBORS]; n],
            sub_slot_in: vec![[0; MAX_NEIGHBORS]; n],
        };

        // Per-patch time-independent scalars.
        for (i, p) in basin.patches.iter().enumerate() {
            let expected = p.num_soil_intervals + 1;
            if p.transmissivity_profile.len() != expected {
                return Err(TopologyError::ProfileLength {
                    patch: i,
                    got: p.transmissivity_profile.len(),
                    expected,
                });
            }
            ctx.basin_area += p.area;
            ctx.area.push(p.area);
            ctx.z.push(p.z);
            ctx.psize.push(p.psize());
            ctx.pscale.push(std_scale * p.std);
            ctx.sfcknl
                .push(p.slope_max.tan().sqrt() / (p.mann_n * p.psize()));
            ctx.retdep.push(p.soil.detention_store_size);
            ctx.rootzs.push(p.root_saturation());
            ctx.ksatv.push(p.ksat_vertical);
            ctx.ksat_0.push(p.soil.ksat_0_v);
            ctx.mz_v.push(p.soil.mz_v);
            ctx.por_0.push(p.soil.porosity_0);
            ctx.por_d.push(p.soil.porosity_decay);
            ctx.psi_air.push(p.soil.psi_air_entry);
            ctx.zsoil.push(p.soil.soil_depth);
            ctx.nsoil.push(p.num_soil_intervals);
            ctx.dzsoil.push(p.soil.interval_size);
            ctx.cap_h2o.push(p.field_capacity);
            ctx.trans_profile.push(p.transmissivity_profile.clone());
            ctx.stream.push(p.stream);
        }

        ctx.build_surface_tables(basin)?;
        ctx.build_subsurface_tables(basin)?;
        Ok(ctx)
    }

    /// Normalize surface outflow weights per source and invert them into
    /// the destinations' inflow tables.
    ///
    /// Every outflow edge produces exactly one inflow entry; the entry
    /// stores the source patch index and the area-ratio-scaled weight.
    fn build_surface_tables(&mut self, basin: &Basin) -> Result<(), TopologyError> {
        let n = self.n_patches;
        for (i, p) in basin.patches.iter().enumerate() {
            if p.surface_outflows.is_empty() {
                continue;
            }
            if p.surface_outflows.len() > MAX_NEIGHBORS {
                return Err(TopologyError::TooManyOutflows {
                    patch: i,
                    count: p.surface_outflows.len(),
                    max: MAX_NEIGHBORS,
                });
            }
            let gsum: f64 = p.surface_outflows.iter().map(|nb| nb.gamma).sum();
            if gsum <= ZERO {
                return Err(TopologyError::ZeroOutflowWeights { patch: i });
            }
            self.sfc_cnt_out[i] = p.surface_outflows.len();
            for nb in &p.surface_outflows {
                let r = nb.patch;
                if r >= n {
                    return Err(TopologyError::BadNeighbor {
                        patch: i,
                        neighbor: r,
                        n_patches: n,
                    });
                }
                let m = self.sfc_cnt_in[r];
                if m == MAX_NEIGHBORS {
                    return Err(TopologyError::TooManyInflows {
                        patch: r,
                        max: MAX_NEIGHBORS,
                    });
                }
                self.sfc_ndx_in[r][m] = i;
                self.sfc_gam_in[r][m] = (nb.gamma / gsum) * self.area[i] / self.area[r];
                self.sfc_cnt_in[r] = m + 1;
            }
        }
        Ok(())
    }

    /// Compute subsurface per-edge geometry and invert the outflow tables.
    fn build_subsurface_tables(&mut self, basin: &Basin) -> Result<(), TopologyError> {
        let n = self.n_patches;
        for (i, p) in basin.patches.iter().enumerate() {
            if p.subsurface_outflows.len() > MAX_NEIGHBORS {
                return Err(TopologyError::TooManyOutflows {
                    patch: i,
                    count: p.subsurface_outflows.len(),
                    max: MAX_NEIGHBORS,
                });
            }
            for (j, &k) in p.subsurface_outflows.iter().enumerate() {
                if k >= n {
                    return Err(TopologyError::BadNeighbor {
                        patch: i,
                        neighbor: k,
                        n_patches: n,
                    });
                }
                let dx = basin.patches[k].x - p.x;
                let dy = basin.patches[k].y - p.y;
                let dist = dx.hypot(dy);
                if dist <= ZERO {
                    return Err(TopologyError::ZeroDistance {
                        patch: i,
                        neighbor: k,
                    });
                }
                // Axis-aligned when |dx| + |dy| >= 1.1 * dist.
                let factor = if dx.abs() + dy.abs() >= 1.1 * dist {
                    AXIS_FACTOR
                } else {
                    DIAG_FACTOR
                };
                self.sub_ndx_out[i][j] = k;
                self.sub_dist[i][j] = dist;
                self.sub_perimf[i][j] = factor * self.area[i] / self.area[k];
            }
            self.sub_cnt_out[i] = p.subsurface_outflows.len();
        }

        // Inversion: append every outflow edge (i, j) -> k to k's inflow
        // table, remembering which slot of i's table points at k.
        for i in 0..n {
            for j in 0..self.sub_cnt_out[i] {
                let k = self.sub_ndx_out[i][j];
                let m = self.sub_cnt_in[k];
                if m == MAX_NEIGHBORS {
                    return Err(TopologyError::TooManyInflows {
                        patch: k,
                        max: MAX_NEIGHBORS,
                    });
                }
                self.sub_ndx_in[k][m] = i;
                self.sub_slot_in[k][m] = j;
                self.sub_cnt_in[k] = m + 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basin::{Basin, Patch, SurfaceNeighbor};

    fn two_patch_basin() -> Basin {
        let mut a = Patch::new(0.0, 0.0, 100.0, 10.0);
        let b = Patch::new(0.0, 10.0, 100.0, 0.0);
        a.surface_outflows = vec![SurfaceNeighbor { patch: 1, gamma: 1.0 }];
        a.subsurface_outflows = vec![1];
        Basin::new(vec![a, b])
    }

    #[test]
    fn empty_basin_is_rejected() {
        assert!(matches!(
            RoutingContext::build(&Basin::default(), 1.0),
            Err(TopologyError::EmptyBasin)
        ));
    }

    #[test]
    fn surface_inversion_matches_outflow() {
        let ctx = RoutingContext::build(&two_patch_basin(), 1.0).unwrap();
        assert_eq!(ctx.sfc_cnt_in[1], 1);
        assert_eq!(ctx.sfc_ndx_in[1][0], 0);
        // equal areas: normalized gamma 1.0 scaled by area ratio 1.0
        assert!((ctx.sfc_gam_in[1][0] - 1.0).abs() < 1e-12);
        assert_eq!(ctx.sfc_cnt_in[0], 0);
    }

    #[test]
    fn surface_weights_are_normalized_and_area_scaled() {
        let mut a = Patch::new(0.0, 0.0, 200.0, 10.0);
        let b = Patch::new(0.0, 10.0, 100.0, 0.0);
        let c = Patch::new(10.0, 10.0, 100.0, 0.0);
        a.surface_outflows = vec![
            SurfaceNeighbor { patch: 1, gamma: 3.0 },
            SurfaceNeighbor { patch: 2, gamma: 1.0 },
        ];
        let ctx = RoutingContext::build(&Basin::new(vec![a, b, c]), 1.0).unwrap();
        // gamma_hat = 0.75 and 0.25, scaled by area ratio 200/100
        assert!((ctx.sfc_gam_in[1][0] - 1.5).abs() < 1e-12);
        assert!((ctx.sfc_gam_in[2][0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn subsurface_edge_geometry() {
        let ctx = RoutingContext::build(&two_patch_basin(), 1.0).unwrap();
        assert_eq!(ctx.sub_cnt_out[0], 1);
        assert!((ctx.sub_dist[0][0] - 10.0).abs() < 1e-12);
        // |dx| + |dy| = dist < 1.1 * dist, so the diagonal factor applies
        assert!((ctx.sub_perimf[0][0] - DIAG_FACTOR).abs() < 1e-12);
        assert_eq!(ctx.sub_cnt_in[1], 1);
        assert_eq!(ctx.sub_ndx_in[1][0], 0);
        assert_eq!(ctx.sub_slot_in[1][0], 0);
    }

    #[test]
    fn dogleg_edge_gets_axis_factor() {
        // |dx| + |dy| = 7 >= 1.1 * 5, so the axis-aligned factor applies
        let mut a = Patch::new(0.0, 0.0, 100.0, 10.0);
        let b = Patch::new(3.0, 4.0, 100.0, 0.0);
        a.subsurface_outflows = vec![1];
        let ctx = RoutingContext::build(&Basin::new(vec![a, b]), 1.0).unwrap();
        assert!((ctx.sub_perimf[0][0] - AXIS_FACTOR).abs() < 1e-12);
    }

    #[test]
    fn fan_in_overflow_is_fatal() {
        // 17 patches all draining into one sink must be refused
        let sink = Patch::new(0.0, 0.0, 100.0, 0.0);
        let mut patches = vec![sink];
        for s in 0..17 {
            let mut p = Patch::new(10.0 + s as f64, 10.0, 100.0, 5.0);
            p.surface_outflows = vec![SurfaceNeighbor { patch: 0, gamma: 1.0 }];
            patches.push(p);
        }
        let err = RoutingContext::build(&Basin::new(patches), 1.0).unwrap_err();
        assert!(
            matches!(err, TopologyError::TooManyInflows { patch: 0, .. }),
            "got {err}"
        );
    }

    #[test]
    fn bad_neighbor_is_fatal() {
        let mut a = Patch::new(0.0, 0.0, 100.0, 10.0);
        a.subsurface_outflows = vec![5];
        let err = RoutingContext::build(&Basin::new(vec![a]), 1.0).unwrap_err();
        assert!(matches!(err, TopologyError::BadNeighbor { neighbor: 5, .. }));
    }

    #[test]
    fn profile_length_is_checked() {
        let mut a = Patch::new(0.0, 0.0, 100.0, 10.0);
        a.transmissivity_profile.pop();
        let err = RoutingContext::build(&Basin::new(vec![a]), 1.0).unwrap_err();
        assert!(matches!(err, TopologyError::ProfileLength { patch: 0, .. }));
    }

    #[test]
    fn sfcknl_uses_slope_and_roughness() {
        let basin = two_patch_basin();
        let p = &basin.patches[0];
        let ctx = RoutingContext::build(&basin, 1.0).unwrap();
        let expected = p.slope_max.tan().sqrt() / (p.mann_n * p.area.sqrt());
        assert!((ctx.sfcknl[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn pscale_applies_std_scale() {
        let mut basin = two_patch_basin();
        basin.patches[0].std = 0.2;
        let ctx = RoutingContext::build(&basin, 2.5).unwrap();
        assert!((ctx.pscale[0] - 0.5).abs() < 1e-12);
    }
}
