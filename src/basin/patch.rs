//! Patch: the unit cell of the simulated landscape.
//!
//! A patch carries its geometry, a vertical soil profile, the hydrologic
//! state for water and the four dissolved species (nitrate, ammonium,
//! dissolved organic N, dissolved organic C), and its two outflow
//! neighbor lists (surface and subsurface). Neighbor references are dense
//! indices into [`Basin::patches`](super::Basin), assigned when the basin
//! is assembled.

/// Soil-profile parameters shared by the routing components.
///
/// Vertical conductivity and porosity follow exponential-decay profiles:
/// `K(z) = ksat_0_v * exp(-z / mz_v)` and
/// `phi(z) = porosity_0 * exp(-z / porosity_decay)`. A decay length of
/// 999.9 or more selects a depth-constant profile.
#[derive(Clone, Debug)]
pub struct SoilParams {
    /// Thickness of one vertical soil interval (m).
    pub interval_size: f64,
    /// Depth of surface water held in micro-depressions (m); water below
    /// this does not participate in overland flow.
    pub detention_store_size: f64,
    /// Saturated vertical hydraulic conductivity at the surface (m/s).
    pub ksat_0_v: f64,
    /// e-folding depth of the vertical conductivity profile (m).
    pub mz_v: f64,
    /// Porosity at the surface.
    pub porosity_0: f64,
    /// e-folding depth of the porosity profile (m); >= 999.9 means constant.
    pub porosity_decay: f64,
    /// Air-entry tension (m of water).
    pub psi_air_entry: f64,
    /// Total soil depth (m).
    pub soil_depth: f64,
    /// Mineral-nitrogen decay rate with depth (1/m).
    pub n_decay_rate: f64,
    /// Dissolved-organic-matter decay rate with depth (1/m).
    pub dom_decay_rate: f64,
}

impl Default for SoilParams {
    fn default() -> Self {
        Self {
            interval_size: 0.1,
            detention_store_size: 0.01,
            ksat_0_v: 5.0e-5,
            mz_v: 0.2,
            porosity_0: 0.45,
            porosity_decay: 999.9,
            psi_air_entry: 0.2,
            soil_depth: 1.0,
            n_decay_rate: 0.25,
            dom_decay_rate: 0.5,
        }
    }
}

/// Root-zone summary used to pick the saturation fraction for infiltration.
#[derive(Clone, Copy, Debug, Default)]
pub struct RootZone {
    /// Rooting depth (m); zero means no root zone.
    pub depth: f64,
    /// Relative saturation of the root zone, in [0, 1].
    pub s: f64,
}

/// Column nitrogen pools (kg/m2, expressed per unit patch area).
#[derive(Clone, Copy, Debug, Default)]
pub struct SoilNitrogen {
    pub nitrate: f64,
    pub sminn: f64,
    pub don: f64,
}

/// Column carbon pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoilCarbon {
    pub doc: f64,
}

/// One surface outflow edge: destination patch and its exchange weight.
///
/// Weights are normalized per source during topology construction, so only
/// their ratios matter here.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceNeighbor {
    /// Index of the receiving patch in [`Basin::patches`](super::Basin).
    pub patch: usize,
    /// Un-normalized exchange weight `gamma(S, R)`.
    pub gamma: f64,
}

/// The smallest spatial unit of the simulation.
#[derive(Clone, Debug)]
pub struct Patch {
    // --- geometry ---
    /// Planar position (m).
    pub x: f64,
    /// Planar position (m).
    pub y: f64,
    /// Planar area (m2).
    pub area: f64,
    /// Surface elevation (m).
    pub z: f64,
    /// Maximum surface slope (radians).
    pub slope_max: f64,
    /// Manning roughness.
    pub mann_n: f64,
    /// Standard deviation of microtopography (m of saturation deficit).
    pub std: f64,
    /// Whether this patch belongs to the stream network.
    pub stream: bool,

    // --- soil profile ---
    pub soil: SoilParams,
    /// Number of vertical soil intervals; the transmissivity profile has
    /// `num_soil_intervals + 1` entries.
    pub num_soil_intervals: usize,
    /// Integrated horizontal conductivity, indexed by discretized
    /// saturation-deficit interval.
    pub transmissivity_profile: Vec<f64>,
    /// Column water content at field capacity (m).
    pub field_capacity: f64,
    /// Fraction of the patch area that infiltrates (0 = impervious).
    pub ksat_vertical: f64,
    pub rootzone: RootZone,
    /// Relative saturation of the whole column, used when there is no
    /// root zone.
    pub s: f64,

    // --- hydrologic state ---
    /// Detention-store (surface pool) water (m).
    pub detention_store: f64,
    pub surface_no3: f64,
    pub surface_nh4: f64,
    pub surface_doc: f64,
    pub surface_don: f64,
    /// Water depth required to saturate the column (m).
    pub sat_deficit: f64,
    /// Depth of the water table below the surface (m).
    pub sat_deficit_z: f64,
    pub soil_ns: SoilNitrogen,
    pub soil_cs: SoilCarbon,

    // --- drainage lists ---
    /// Ordered surface downhill neighbors with exchange weights.
    pub surface_outflows: Vec<SurfaceNeighbor>,
    /// Ordered subsurface downhill neighbors.
    pub subsurface_outflows: Vec<usize>,
}

impl Patch {
    /// Create a patch at `(x, y)` with the given area and elevation.
    ///
    /// Soil parameters take their defaults, the transmissivity profile is
    /// depth-uniform, and all state pools start empty with the column at
    /// field capacity. Callers adjust fields directly before assembling
    /// the basin.
    pub fn new(x: f64, y: f64, area: f64, z: f64) -> Self {
        let soil = SoilParams::default();
        let num_soil_intervals = (soil.soil_depth / soil.interval_size).round() as usize;
        Self {
            x,
            y,
            area,
            z,
            slope_max: 0.1,
            mann_n: 0.05,
            std: 0.0,
            stream: false,
            num_soil_intervals,
            transmissivity_profile: vec![1.0e-4; num_soil_intervals + 1],
            field_capacity: 0.3,
            ksat_vertical: 1.0,
            rootzone: RootZone::default(),
            s: 0.5,
            soil,
            detention_store: 0.0,
            surface_no3: 0.0,
            surface_nh4: 0.0,
            surface_doc: 0.0,
            surface_don: 0.0,
            sat_deficit: 0.0,
            sat_deficit_z: 0.0,
            soil_ns: SoilNitrogen::default(),
            soil_cs: SoilCarbon::default(),
            surface_outflows: Vec::new(),
            subsurface_outflows: Vec::new(),
        }
    }

    /// Cell size: `sqrt(area)` (m).
    #[inline]
    pub fn psize(&self) -> f64 {
        self.area.sqrt()
    }

    /// Saturation fraction used by the infiltration model: the root zone's
    /// when a root zone exists, otherwise the whole column's.
    #[inline]
    pub fn root_saturation(&self) -> f64 {
        if self.rootzone.depth > crate::constants::ZERO {
            self.rootzone.s
        } else {
            self.s
        }
    }
}
