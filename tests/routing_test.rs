//! Integration tests for the integrated routing engine.
//!
//! These exercise the full driver loop:
//! - lateral mass conservation on closed basins
//! - downhill migration of surface storage
//! - canopy sources feeding the surface pools
//! - non-negativity of every pool
//! - idempotence of a zero external step
//! - inflow/outflow table inversion
//! - fan-in saturation refusal

use basinflow::constants::CPL_MAX;
use basinflow::{
    hydro_routing, Basin, HydroRouter, Patch, Pool, RoutingConfig, RoutingContext,
    SurfaceNeighbor, TopologyError, UniformThroughfall,
};

/// Grid basin with some column drawdown so both routing layers act.
fn wetted_grid(nx: usize, ny: usize) -> Basin {
    let mut basin = Basin::uniform_slope(nx, ny, 10.0, 5.0);
    for p in &mut basin.patches {
        p.sat_deficit = 0.05;
        p.sat_deficit_z = 0.12;
        p.soil_ns.nitrate = 0.01;
        p.soil_cs.doc = 0.02;
    }
    basin.patches[0].detention_store = 0.03;
    basin.patches[0].surface_no3 = 0.002;
    basin
}

#[test]
fn closed_basin_conserves_water() {
    let mut basin = wetted_grid(4, 4);
    let before = basin.total_water();

    let mut router = HydroRouter::new(RoutingConfig::default(), &basin).unwrap();
    let report = router.route(&mut basin, 3600.0);

    let after = basin.total_water();
    assert!(report.n_substeps >= 1);
    assert!(
        (before - after).abs() < 1e-9 * before.max(1.0),
        "water not conserved: {before} -> {after}"
    );
}

#[test]
fn closed_basin_conserves_species() {
    let mut basin = wetted_grid(4, 4);
    let no3_before: f64 = basin
        .patches
        .iter()
        .map(|p| (p.surface_no3 + p.soil_ns.nitrate) * p.area)
        .sum();

    let mut router = HydroRouter::new(RoutingConfig::default(), &basin).unwrap();
    router.route(&mut basin, 3600.0);

    let no3_after: f64 = basin
        .patches
        .iter()
        .map(|p| (p.surface_no3 + p.soil_ns.nitrate) * p.area)
        .sum();
    assert!(
        (no3_before - no3_after).abs() < 1e-12,
        "NO3 not conserved: {no3_before} -> {no3_after}"
    );
}

#[test]
fn surface_storage_migrates_downhill() {
    // three-patch cascade wetted at the top, infiltration disabled
    let mut patches = Vec::new();
    for i in 0..3 {
        let mut p = Patch::new(0.0, 10.0 * i as f64, 100.0, 10.0 - i as f64);
        p.soil.ksat_0_v = 0.0;
        if i < 2 {
            p.surface_outflows = vec![SurfaceNeighbor {
                patch: i + 1,
                gamma: 1.0,
            }];
        }
        patches.push(p);
    }
    patches[0].detention_store = 0.05;
    let mut basin = Basin::new(patches);

    let mut router = HydroRouter::new(RoutingConfig::default(), &basin).unwrap();
    router.route(&mut basin, 3600.0);

    let stores: Vec<f64> = basin.patches.iter().map(|p| p.detention_store).collect();
    assert!(stores[0] < 0.05, "top patch must drain, kept {}", stores[0]);
    assert!(stores[1] > 0.0 && stores[2] > 0.0, "mass must reach downhill patches");
    let total: f64 = stores.iter().sum();
    assert!(
        (total - 0.05).abs() < 1e-9,
        "chain must conserve surface water, total {total}"
    );
}

#[test]
fn canopy_forcing_adds_exactly_its_input() {
    let mut basin = Basin::uniform_slope(2, 2, 10.0, 5.0);
    for p in &mut basin.patches {
        p.soil.ksat_0_v = 0.0; // keep the added water on the surface
        p.sat_deficit = 0.02;
        p.sat_deficit_z = 0.05;
    }
    let before = basin.total_water();

    let rate = 2.0e-7; // m/s of throughfall
    let forcing = UniformThroughfall {
        rate: Pool::water(rate),
    };
    let mut router = HydroRouter::new(RoutingConfig::default(), &basin).unwrap();
    let extstep = 1800.0;
    router.route_with(&mut basin, extstep, &forcing, &mut basinflow::NoStream);

    let area: f64 = basin.patches.iter().map(|p| p.area).sum();
    let added = rate * extstep * area;
    let after = basin.total_water();
    assert!(
        ((after - before) - added).abs() < 1e-9 * added,
        "gained {} expected {}",
        after - before,
        added
    );
}

#[test]
fn pools_stay_non_negative() {
    let mut basin = wetted_grid(5, 5);
    for (i, p) in basin.patches.iter_mut().enumerate() {
        p.detention_store = 0.01 + 0.002 * (i % 3) as f64;
        p.surface_nh4 = 1.0e-4;
        p.surface_don = 2.0e-4;
        p.soil_ns.sminn = 0.005;
        p.soil_ns.don = 0.004;
    }

    let mut router = HydroRouter::new(RoutingConfig::default(), &basin).unwrap();
    for _ in 0..4 {
        router.route(&mut basin, 3600.0);
    }

    for (i, p) in basin.patches.iter().enumerate() {
        for (name, v) in [
            ("detention_store", p.detention_store),
            ("surface_no3", p.surface_no3),
            ("surface_nh4", p.surface_nh4),
            ("surface_don", p.surface_don),
            ("surface_doc", p.surface_doc),
            ("nitrate", p.soil_ns.nitrate),
            ("sminn", p.soil_ns.sminn),
            ("don", p.soil_ns.don),
            ("doc", p.soil_cs.doc),
        ] {
            assert!(v >= 0.0, "patch {i}: {name} went negative ({v})");
        }
    }
}

#[test]
fn zero_external_step_leaves_state_untouched() {
    let mut basin = wetted_grid(3, 3);
    let before = basin.clone();

    let report = hydro_routing(&RoutingConfig::default(), 0.0, &mut basin).unwrap();
    assert_eq!(report.n_substeps, 0);

    for (a, b) in before.patches.iter().zip(basin.patches.iter()) {
        assert_eq!(a.detention_store, b.detention_store);
        assert_eq!(a.surface_no3, b.surface_no3);
        assert_eq!(a.sat_deficit, b.sat_deficit);
        assert_eq!(a.sat_deficit_z, b.sat_deficit_z);
        assert_eq!(a.soil_ns.nitrate, b.soil_ns.nitrate);
        assert_eq!(a.soil_cs.doc, b.soil_cs.doc);
    }
}

#[test]
fn substeps_respect_the_coupling_cap() {
    let mut basin = wetted_grid(3, 3);
    let mut router = HydroRouter::new(RoutingConfig::default(), &basin).unwrap();
    let report = router.route(&mut basin, 7200.0);
    assert!(
        report.dt_max <= CPL_MAX + 1e-9,
        "substep {} exceeds the coupling cap",
        report.dt_max
    );
}

#[test]
fn every_outflow_edge_has_one_inflow_entry() {
    // a fan: patch 0 drains to 1 and 2 with unequal weights
    let mut top = Patch::new(0.0, 0.0, 200.0, 10.0);
    let left = Patch::new(-10.0, 10.0, 100.0, 0.0);
    let right = Patch::new(10.0, 10.0, 100.0, 0.0);
    top.surface_outflows = vec![
        SurfaceNeighbor { patch: 1, gamma: 3.0 },
        SurfaceNeighbor { patch: 2, gamma: 1.0 },
    ];
    top.subsurface_outflows = vec![1, 2];
    let basin = Basin::new(vec![top, left, right]);
    let ctx = RoutingContext::build(&basin, 1.0).unwrap();

    // surface: each destination sees exactly the source, weight scaled by
    // the area ratio
    for (dest, gamma_hat) in [(1usize, 0.75), (2usize, 0.25)] {
        assert_eq!(ctx.sfc_cnt_in[dest], 1);
        assert_eq!(ctx.sfc_ndx_in[dest][0], 0);
        let expected = gamma_hat * 200.0 / 100.0;
        assert!(
            (ctx.sfc_gam_in[dest][0] - expected).abs() < 1e-12,
            "dest {dest}: weight {} expected {expected}",
            ctx.sfc_gam_in[dest][0]
        );
    }

    // subsurface: inflow entries point back at the source slot
    for (dest, slot) in [(1usize, 0usize), (2usize, 1usize)] {
        assert_eq!(ctx.sub_cnt_in[dest], 1);
        assert_eq!(ctx.sub_ndx_in[dest][0], 0);
        assert_eq!(ctx.sub_slot_in[dest][0], slot);
        assert_eq!(ctx.sub_ndx_out[0][slot], dest);
    }
}

#[test]
fn oversubscribed_sink_is_refused() {
    let sink = Patch::new(0.0, 0.0, 100.0, 0.0);
    let mut patches = vec![sink];
    for s in 0..17 {
        let mut p = Patch::new(10.0 + s as f64, 10.0, 100.0, 5.0);
        p.subsurface_outflows = vec![0];
        patches.push(p);
    }
    let basin = Basin::new(patches);
    let err = HydroRouter::new(RoutingConfig::default(), &basin).unwrap_err();
    assert!(
        matches!(err, TopologyError::TooManyInflows { patch: 0, .. }),
        "expected fan-in overflow, got {err}"
    );
}
