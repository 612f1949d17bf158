//! # basinflow
//!
//! Coupled hydrologic routing across a landscape discretized into patches.
//!
//! This crate provides the integrated routing engine for a basin:
//! - Drainage topology with inflow-matrix inversion ([`topology`])
//! - Lateral subsurface routing with an adaptive, Courant-stable
//!   coupling sub-step ([`routing::subsurface`])
//! - Two-dimensional kinematic-wave surface routing with Green-Ampt
//!   sorptivity infiltration ([`routing::surface`])
//! - Vertical groundwater balancing and water-table recovery
//!   ([`routing::vertical`])
//! - Seams for canopy forcing and stream-network routing
//!   ([`routing::canopy`], [`routing::stream`])
//!
//! Water and the four dissolved species (nitrate, ammonium, dissolved
//! organic N and C) move together: every transport path carries species
//! in proportion to the water it carries.
//!
//! Rate computation is owned by source patches and state updates by
//! destination patches through pre-inverted inflow tables, so all patch
//! loops are race-free and run in parallel under the `parallel` feature
//! (enabled by default).
//!
//! # Example
//!
//! ```
//! use basinflow::{Basin, HydroRouter, RoutingConfig};
//!
//! // a 4 x 4 grid draining down one side, wetted at the top
//! let mut basin = Basin::uniform_slope(4, 4, 10.0, 5.0);
//! basin.patches[0].detention_store = 0.04;
//!
//! let mut router = HydroRouter::new(RoutingConfig::default(), &basin).unwrap();
//! let report = router.route(&mut basin, 3600.0);
//!
//! assert!(report.n_substeps >= 1);
//! assert!(basin.patches[0].detention_store < 0.04);
//! ```

pub mod basin;
pub mod constants;
mod parallel;
pub mod routing;
pub mod topology;

pub use basin::{Basin, Patch, RootZone, SoilCarbon, SoilNitrogen, SoilParams, SurfaceNeighbor};
pub use routing::{
    can_routing, hydro_routing, potential_snow_interception, sfc_routing, sub_routing,
    sub_vertical, water_table_depth, CanopyForcing, CanopyStratum, HydroRouter, NoCanopy,
    NoStream, Pool, RoutingConfig, RoutingReport, StreamRouter, UniformThroughfall, VegType,
    WorkState,
};
pub use topology::{RoutingContext, TopologyError};
