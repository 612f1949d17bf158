//! Integrated routing driver.
//!
//! One external step runs as a sequence of coupling sub-steps, each
//! strictly ordered:
//!
//! ```text
//! sub_routing -> can_routing -> sfc_routing -> stream routing -> sub_vertical
//! ```
//!
//! The subsurface router picks each sub-step from the Courant condition
//! on its own velocities; the surface router nests a second adaptive loop
//! inside it. Patch state is snapshotted into dense working arrays before
//! the loop and written back when the external step is exhausted, so the
//! basin is never observed mid-step.

pub mod canopy;
pub mod state;
pub mod stream;
pub mod subsurface;
pub mod surface;
pub mod vertical;

pub use canopy::{
    can_routing, potential_snow_interception, CanopyForcing, CanopyStratum, NoCanopy,
    UniformThroughfall, VegType,
};
pub use state::{Pool, WorkState};
pub use stream::{NoStream, StreamRouter};
pub use subsurface::sub_routing;
pub use surface::sfc_routing;
pub use vertical::{sub_vertical, water_table_depth};

use crate::basin::Basin;
use crate::constants::EPSILON;
use crate::topology::{RoutingContext, TopologyError};

/// Driver configuration.
#[derive(Clone, Debug)]
pub struct RoutingConfig {
    /// Print per-step progress to stdout. No effect on numerics.
    pub verbose: bool,
    /// Multiplier on each patch's microtopographic standard deviation,
    /// widening the transmissivity quadrature.
    pub std_scale: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            std_scale: 1.0,
        }
    }
}

/// Summary of one external routing step.
#[derive(Clone, Copy, Debug)]
pub struct RoutingReport {
    /// Number of coupling sub-steps taken.
    pub n_substeps: usize,
    /// Smallest sub-step (s).
    pub dt_min: f64,
    /// Largest sub-step (s).
    pub dt_max: f64,
}

impl RoutingReport {
    fn empty() -> Self {
        Self {
            n_substeps: 0,
            dt_min: f64::INFINITY,
            dt_max: 0.0,
        }
    }

    fn record(&mut self, dt: f64) {
        self.n_substeps += 1;
        self.dt_min = self.dt_min.min(dt);
        self.dt_max = self.dt_max.max(dt);
    }
}

/// The integrated routing engine.
///
/// Owns the drainage topology (built once) and the working arrays; call
/// [`route`](Self::route) once per external time step.
///
/// # Example
///
/// ```
/// use basinflow::{Basin, HydroRouter, RoutingConfig};
///
/// let mut basin = Basin::uniform_slope(4, 4, 10.0, 5.0);
/// basin.patches[0].detention_store = 0.03;
///
/// let mut router = HydroRouter::new(RoutingConfig::default(), &basin).unwrap();
/// let report = router.route(&mut basin, 3600.0);
/// assert!(report.n_substeps >= 1);
/// ```
#[derive(Debug)]
pub struct HydroRouter {
    config: RoutingConfig,
    ctx: RoutingContext,
    work: WorkState,
}

impl HydroRouter {
    /// Build the drainage topology for `basin` and allocate the working
    /// arrays.
    ///
    /// Fails on configuration errors: inflow/outflow tables exceeding
    /// [`MAX_NEIGHBORS`](crate::constants::MAX_NEIGHBORS), neighbor
    /// references outside the basin, degenerate geometry or profiles.
    pub fn new(config: RoutingConfig, basin: &Basin) -> Result<Self, TopologyError> {
        let ctx = RoutingContext::build(basin, config.std_scale)?;
        let work = WorkState::new(ctx.n_patches);
        Ok(Self { config, ctx, work })
    }

    /// The immutable drainage topology.
    pub fn context(&self) -> &RoutingContext {
        &self.ctx
    }

    /// Advance the basin by `extstep` seconds with no canopy sources and
    /// no stream network.
    pub fn route(&mut self, basin: &mut Basin, extstep: f64) -> RoutingReport {
        self.route_with(basin, extstep, &NoCanopy, &mut NoStream)
    }

    /// Advance the basin by `extstep` seconds.
    ///
    /// State is mutated in place on each patch; the returned report
    /// summarizes the sub-step sequence. An `extstep` within round-off of
    /// zero leaves all state untouched.
    pub fn route_with<F, S>(
        &mut self,
        basin: &mut Basin,
        extstep: f64,
        forcing: &F,
        stream: &mut S,
    ) -> RoutingReport
    where
        F: CanopyForcing,
        S: StreamRouter,
    {
        let mut report = RoutingReport::empty();
        if extstep <= EPSILON {
            return report;
        }

        self.work.load(basin);

        let mut t = extstep;
        while t > EPSILON {
            let substep = sub_routing(&self.ctx, &mut self.work, t);

            can_routing(&self.ctx, forcing, substep, &mut self.work.can);
            sfc_routing(&self.ctx, &mut self.work, substep);
            stream.route(&self.ctx, substep, &mut self.work);
            sub_vertical(&self.ctx, &mut self.work);

            report.record(substep);
            if self.config.verbose {
                println!(
                    "routing: substep {:>4}  dt = {:8.2} s  remaining = {:10.2} s",
                    report.n_substeps,
                    substep,
                    t - substep
                );
            }
            t -= substep;
        }

        self.work.store(basin);

        if self.config.verbose {
            println!(
                "routing: done in {} sub-steps (dt {:.2}..{:.2} s) over {:.3e} m2",
                report.n_substeps, report.dt_min, report.dt_max, self.ctx.basin_area
            );
        }
        report
    }
}

/// One-shot entry point: build a router for `basin` and advance it by
/// `extstep` seconds.
///
/// Rebuilds the topology on every call; callers stepping a basin
/// repeatedly should hold a [`HydroRouter`] instead.
pub fn hydro_routing(
    config: &RoutingConfig,
    extstep: f64,
    basin: &mut Basin,
) -> Result<RoutingReport, TopologyError> {
    let mut router = HydroRouter::new(config.clone(), basin)?;
    Ok(router.route(basin, extstep))
}
