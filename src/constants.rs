//! Numeric constants shared by the routing components.

/// Maximum fan-in / fan-out per patch in the drainage tables.
///
/// Kept as a compile-time bound so the inflow matrices can use fixed-width
/// rows (`[usize; MAX_NEIGHBORS]`). Must stay a multiple of 4 for
/// memory-alignment reasons; raise and recompile for denser drainage graphs.
pub const MAX_NEIGHBORS: usize = 16;

const _: () = assert!(MAX_NEIGHBORS % 4 == 0, "MAX_NEIGHBORS must be a multiple of 4");

/// Upper bound on the subsurface-driven coupling sub-step (seconds).
pub const CPL_MAX: f64 = 1800.0;

/// Maximum Courant number: `vel * dt <= COUMAX` for every patch.
pub const COUMAX: f64 = 0.2;

/// Round-off tolerance for the outer coupling loop: 10 usec.
pub const EPSILON: f64 = 1.0e-5;

/// Exponent in the kinematic-wave velocity law.
pub const TWO_THIRDS: f64 = 2.0 / 3.0;

/// Degrees to radians.
pub const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

/// Threshold below which a quantity is treated as zero in divisions
/// and slope tests.
pub const ZERO: f64 = 1.0e-8;

/// Nodes of the 9-point quadrature over the microtopographic distribution,
/// in standard deviations about the mean saturation deficit.
pub(crate) const QUAD_NODES: [f64; 9] = [
    0.0, 0.253, 0.524, 0.842, 1.283, -0.253, -0.524, -0.842, -1.283,
];

/// Weights paired with [`QUAD_NODES`]; they sum to 1.
pub(crate) const QUAD_WEIGHTS: [f64; 9] = [0.2, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1];
