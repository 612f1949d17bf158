//! Basin: the collection of patches routed together.
//!
//! The routing order of `patches` is irrelevant (the inflow-matrix
//! formulation used by the routers is order-independent), but neighbor
//! indices in the outflow lists must refer into the same vector.

mod patch;

pub use patch::{Patch, RootZone, SoilCarbon, SoilNitrogen, SoilParams, SurfaceNeighbor};

use crate::constants::DEG2RAD;

/// A collection of patches with a fixed drainage topology.
#[derive(Clone, Debug, Default)]
pub struct Basin {
    pub patches: Vec<Patch>,
}

impl Basin {
    pub fn new(patches: Vec<Patch>) -> Self {
        Self { patches }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Build an `nx` x `ny` grid of identical patches on a uniform slope.
    ///
    /// Rows run downhill: row 0 sits highest and every patch in rows
    /// `0..ny-1` drains (surface and subsurface) to the patch directly
    /// below it with unit exchange weight. The bottom row has no outflows,
    /// so the basin is closed and total mass is conserved, which keeps
    /// tests and benches simple.
    ///
    /// # Arguments
    /// * `nx`, `ny` - grid extent (columns, rows)
    /// * `spacing` - cell edge length (m)
    /// * `slope_deg` - terrain slope along the rows (degrees)
    pub fn uniform_slope(nx: usize, ny: usize, spacing: f64, slope_deg: f64) -> Self {
        let slope = slope_deg * DEG2RAD;
        let drop = spacing * slope.tan();
        let mut patches = Vec::with_capacity(nx * ny);
        for r in 0..ny {
            for c in 0..nx {
                let x = c as f64 * spacing;
                let y = r as f64 * spacing;
                let z = (ny - 1 - r) as f64 * drop;
                let mut p = Patch::new(x, y, spacing * spacing, z);
                p.slope_max = slope;
                if r + 1 < ny {
                    let below = (r + 1) * nx + c;
                    p.surface_outflows = vec![SurfaceNeighbor {
                        patch: below,
                        gamma: 1.0,
                    }];
                    p.subsurface_outflows = vec![below];
                }
                patches.push(p);
            }
        }
        Self { patches }
    }

    /// Total basin water: detention stores plus column water
    /// (`field_capacity - sat_deficit`), in m weighted by patch area.
    ///
    /// Used by conservation checks.
    pub fn total_water(&self) -> f64 {
        self.patches
            .iter()
            .map(|p| (p.detention_store + p.field_capacity - p.sat_deficit) * p.area)
            .sum()
    }
}
