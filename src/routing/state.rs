//! Working state for the routing loop.
//!
//! The driver snapshots patch state into dense per-patch arrays once per
//! external step, the routers mutate those arrays sub-step by sub-step,
//! and the driver writes them back when the step is exhausted. Every
//! array is indexed by the dense patch index of the
//! [`RoutingContext`](crate::topology::RoutingContext).

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use crate::basin::Basin;
use crate::constants::ZERO;
use crate::parallel::{par_map_indexed, par_update};

/// Water plus the four dissolved species carried by every pool.
///
/// Used both for stored amounts (m of water, mass of species) and for
/// rates (per second); the arithmetic is the same either way.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pool {
    pub h2o: f64,
    pub no3: f64,
    pub nh4: f64,
    pub don: f64,
    pub doc: f64,
}

impl Pool {
    pub const ZERO: Self = Self {
        h2o: 0.0,
        no3: 0.0,
        nh4: 0.0,
        don: 0.0,
        doc: 0.0,
    };

    #[inline(always)]
    pub fn new(h2o: f64, no3: f64, nh4: f64, don: f64, doc: f64) -> Self {
        Self {
            h2o,
            no3,
            nh4,
            don,
            doc,
        }
    }

    /// A pool holding only water.
    #[inline(always)]
    pub fn water(h2o: f64) -> Self {
        Self {
            h2o,
            ..Self::ZERO
        }
    }

    /// True when every component is non-negative.
    #[inline]
    pub fn is_non_negative(&self) -> bool {
        self.h2o >= 0.0 && self.no3 >= 0.0 && self.nh4 >= 0.0 && self.don >= 0.0 && self.doc >= 0.0
    }
}

impl Add for Pool {
    type Output = Pool;
    #[inline(always)]
    fn add(self, rhs: Pool) -> Pool {
        Pool {
            h2o: self.h2o + rhs.h2o,
            no3: self.no3 + rhs.no3,
            nh4: self.nh4 + rhs.nh4,
            don: self.don + rhs.don,
            doc: self.doc + rhs.doc,
        }
    }
}

impl AddAssign for Pool {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Pool) {
        *self = *self + rhs;
    }
}

impl Sub for Pool {
    type Output = Pool;
    #[inline(always)]
    fn sub(self, rhs: Pool) -> Pool {
        Pool {
            h2o: self.h2o - rhs.h2o,
            no3: self.no3 - rhs.no3,
            nh4: self.nh4 - rhs.nh4,
            don: self.don - rhs.don,
            doc: self.doc - rhs.doc,
        }
    }
}

impl SubAssign for Pool {
    #[inline(always)]
    fn sub_assign(&mut self, rhs: Pool) {
        *self = *self - rhs;
    }
}

impl Mul<f64> for Pool {
    type Output = Pool;
    #[inline(always)]
    fn mul(self, c: f64) -> Pool {
        Pool {
            h2o: c * self.h2o,
            no3: c * self.no3,
            nh4: c * self.nh4,
            don: c * self.don,
            doc: c * self.doc,
        }
    }
}

impl Mul<Pool> for f64 {
    type Output = Pool;
    #[inline(always)]
    fn mul(self, p: Pool) -> Pool {
        p * self
    }
}

impl Neg for Pool {
    type Output = Pool;
    #[inline(always)]
    fn neg(self) -> Pool {
        self * -1.0
    }
}

/// Per-patch working arrays for one external step.
#[derive(Clone, Debug)]
pub struct WorkState {
    /// Surface (detention-store) pools.
    pub sfc: Vec<Pool>,
    /// Column totals: water relative to field capacity, species masses.
    pub tot: Vec<Pool>,
    /// Lateral deltas produced by the subsurface router, one sub-step's
    /// worth.
    pub lat: Vec<Pool>,
    /// Infiltration accumulated by the surface router over one sub-step.
    pub inf: Vec<Pool>,
    /// Canopy source rates (per second) for the current sub-step.
    pub can: Vec<Pool>,
    /// Water-table elevation (m).
    pub waterz: Vec<f64>,
}

impl WorkState {
    /// Allocate zeroed arrays for `n` patches.
    pub fn new(n: usize) -> Self {
        Self {
            sfc: vec![Pool::ZERO; n],
            tot: vec![Pool::ZERO; n],
            lat: vec![Pool::ZERO; n],
            inf: vec![Pool::ZERO; n],
            can: vec![Pool::ZERO; n],
            waterz: vec![0.0; n],
        }
    }

    pub fn n_patches(&self) -> usize {
        self.sfc.len()
    }

    /// Snapshot patch state into the working arrays.
    ///
    /// Column water is measured against field capacity
    /// (`totH2O = field_capacity - sat_deficit`) and the water table sits
    /// at `z - max(sat_deficit_z, 0)`.
    pub fn load(&mut self, basin: &Basin) {
        let n = basin.len();
        self.sfc = par_map_indexed(n, |i| {
            let p = &basin.patches[i];
            Pool::new(
                p.detention_store,
                p.surface_no3,
                p.surface_nh4,
                p.surface_don,
                p.surface_doc,
            )
        });
        self.tot = par_map_indexed(n, |i| {
            let p = &basin.patches[i];
            Pool::new(
                p.field_capacity - p.sat_deficit,
                p.soil_ns.nitrate,
                p.soil_ns.sminn,
                p.soil_ns.don,
                p.soil_cs.doc,
            )
        });
        self.waterz = par_map_indexed(n, |i| {
            let p = &basin.patches[i];
            p.z - if p.sat_deficit_z > ZERO {
                p.sat_deficit_z
            } else {
                0.0
            }
        });
        self.lat = vec![Pool::ZERO; n];
        self.inf = vec![Pool::ZERO; n];
        self.can = vec![Pool::ZERO; n];
    }

    /// Write the working arrays back into the patches.
    pub fn store(&self, basin: &mut Basin) {
        let sfc = &self.sfc;
        let tot = &self.tot;
        let waterz = &self.waterz;
        par_update(&mut basin.patches, |i, p| {
            p.detention_store = sfc[i].h2o;
            p.surface_no3 = sfc[i].no3;
            p.surface_nh4 = sfc[i].nh4;
            p.surface_don = sfc[i].don;
            p.surface_doc = sfc[i].doc;

            p.sat_deficit_z = p.z - waterz[i];
            p.sat_deficit = p.field_capacity - tot[i].h2o;
            p.soil_ns.nitrate = tot[i].no3;
            p.soil_ns.sminn = tot[i].nh4;
            p.soil_ns.don = tot[i].don;
            p.soil_cs.doc = tot[i].doc;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basin::{Basin, Patch};

    #[test]
    fn pool_arithmetic() {
        let a = Pool::new(1.0, 0.1, 0.2, 0.3, 0.4);
        let b = Pool::new(0.5, 0.1, 0.1, 0.1, 0.1);
        let c = a + b * 2.0;
        assert!((c.h2o - 2.0).abs() < 1e-12);
        assert!((c.no3 - 0.3).abs() < 1e-12);
        assert_eq!(-Pool::water(1.0), Pool::water(-1.0));
    }

    #[test]
    fn load_store_round_trips() {
        let mut basin = Basin::new(vec![Patch::new(0.0, 0.0, 100.0, 5.0)]);
        {
            let p = &mut basin.patches[0];
            p.detention_store = 0.02;
            p.surface_no3 = 0.001;
            p.sat_deficit = 0.1;
            p.sat_deficit_z = 0.4;
            p.soil_ns.nitrate = 0.3;
        }
        let mut work = WorkState::new(1);
        work.load(&basin);
        assert!((work.sfc[0].h2o - 0.02).abs() < 1e-12);
        assert!((work.tot[0].h2o - (0.3 - 0.1)).abs() < 1e-12);
        assert!((work.waterz[0] - (5.0 - 0.4)).abs() < 1e-12);

        let mut out = basin.clone();
        work.store(&mut out);
        let p = &out.patches[0];
        assert!((p.detention_store - 0.02).abs() < 1e-12);
        assert!((p.sat_deficit - 0.1).abs() < 1e-12);
        assert!((p.sat_deficit_z - 0.4).abs() < 1e-12);
        assert!((p.soil_ns.nitrate - 0.3).abs() < 1e-12);
    }
}
