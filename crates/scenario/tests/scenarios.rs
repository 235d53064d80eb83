//! End-to-end scenario runs on small synthetic landscapes

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use landshift_core::io::write_geotiff;
use landshift_core::{Error, ErrorKind, GeoTransform, Raster, Result};
use landshift_scenario::{
    run_scenario, Composite, ConversionPolicy, CoreFragmentation, EngineOptions, Evaluator, FrozenOrder, Predefined,
    ScenarioConfig, ScenarioEngine, ScenarioState, Selection, StepOutput,
};

fn forest() -> BTreeSet<i32> {
    [1].into_iter().collect()
}

/// Counts pixels of code 1
struct ForestCount;

impl Evaluator for ForestCount {
    fn name(&self) -> &'static str {
        "forest_count"
    }

    fn columns(&self) -> Vec<String> {
        vec!["forest_pixels".to_string()]
    }

    fn evaluate(&self, lulc: &Raster<i32>, _keep_maps: bool) -> Result<StepOutput> {
        Ok(StepOutput {
            values: vec![lulc.count_where(|v| v == 1) as f64],
            maps: Vec::new(),
        })
    }
}

fn forest_counts(policy: Box<dyn ConversionPolicy>, lulc: Raster<i32>, steps: i32, pps: usize) -> Vec<usize> {
    let state = ScenarioState::new(lulc, steps, pps, 9);
    let mut engine = ScenarioEngine::new(
        state,
        policy,
        vec![Box::new(ForestCount)],
        Vec::new(),
        EngineOptions::default(),
    )
    .unwrap();
    let mut counts = Vec::new();
    engine
        .run_with(|report| match report.cells[0] {
            landshift_scenario::Cell::Float(v) => counts.push(v as usize),
            landshift_scenario::Cell::Int(v) => counts.push(v as usize),
        })
        .unwrap();
    counts
}

fn tiny_lulc() -> Raster<i32> {
    #[rustfmt::skip]
    let values = vec![
        0, 0, 1, 1, 0,
        0, 1, 1, 1, 0,
        1, 1, 1, 1, 1,
        0, 1, 1, 1, 0,
        0, 0, 1, 1, 0,
    ];
    Raster::from_vec(values, 5, 5).unwrap()
}

// ---------------------------------------------------------------------------
// Policies through the engine
// ---------------------------------------------------------------------------

#[test]
fn tiny_edge_expansion() {
    let lulc = tiny_lulc();
    assert_eq!(lulc.count_where(|v| v == 1), 15);

    let counts = forest_counts(Box::new(FrozenOrder::edge_expansion(forest())), lulc.clone(), 3, 1);
    assert_eq!(counts, vec![15, 14, 13, 12]);

    // The first pixel to go is the forest pixel at the top border
    let mut state = ScenarioState::new(lulc, 1, 1, 9);
    let mut policy = FrozenOrder::edge_expansion(forest());
    policy.initial(&state).unwrap();
    state.advance();
    match policy.select(&state).unwrap() {
        Selection::Convert(indices) => assert_eq!(indices, vec![2]),
        Selection::Replace(_) => panic!("edge expansion converts pixels"),
    }
}

#[test]
fn edge_expansion_is_monotone_and_ends_partially() {
    // 15 forest pixels, 4 per step: 4, 8, 12, then the last 3
    let counts = forest_counts(Box::new(FrozenOrder::edge_expansion(forest())), tiny_lulc(), 4, 4);
    assert!(counts.windows(2).all(|w| w[1] <= w[0]));
    for (k, &count) in counts.iter().enumerate() {
        assert_eq!(15 - count, (k * 4).min(15));
    }
}

#[test]
fn core_fragmentation_diverges_from_core_expansion() {
    let lulc: Raster<i32> = Raster::filled(7, 11, 1);
    let index = |r: usize, c: usize| r * 11 + c;

    let converted = |policy: Box<dyn ConversionPolicy>| -> BTreeSet<usize> {
        let state = ScenarioState::new(lulc.clone(), 2, 1, 9);
        let mut engine =
            ScenarioEngine::new(state, policy, vec![Box::new(ForestCount)], Vec::new(), EngineOptions::default())
                .unwrap();
        engine.run().unwrap();
        engine
            .state()
            .lulc()
            .values()
            .enumerate()
            .filter(|&(_, v)| v == 9)
            .map(|(i, _)| i)
            .collect()
    };

    // Both start with the deepest pixel, the first of the central ridge
    let expansion = converted(Box::new(FrozenOrder::core_expansion(forest())));
    let fragmentation = converted(Box::new(CoreFragmentation::new(forest())));
    assert!(expansion.contains(&index(3, 3)));
    assert!(fragmentation.contains(&index(3, 3)));

    // The frozen order grows the hole along the ridge
    assert_eq!(expansion, [index(3, 3), index(3, 4)].into_iter().collect());

    // The recomputed order opens a second hole at the far end instead,
    // converting one pixel at step 1 and two at step 2
    assert_eq!(fragmentation.len(), 3);
    assert!(fragmentation.contains(&index(3, 7)));
    assert!(!fragmentation.contains(&index(3, 4)));
}

#[test]
fn composite_halfway_split() {
    // Left half code 2, right half code 9
    let mut lulc: Raster<i32> = Raster::filled(40, 40, 2);
    for r in 0..40 {
        for c in 20..40 {
            lulc.set(r, c, 9).unwrap();
        }
    }
    let start = [(2, 20.0), (9, 80.0)].into_iter().collect();
    let end = [(2, 80.0), (9, 20.0)].into_iter().collect();
    let mut policy = Composite::new(start, end);

    let mut state = ScenarioState::new(lulc, 10, 100, 5);
    for _ in 0..5 {
        state.advance();
    }
    assert_eq!(state.step(), 5);

    let picked = match policy.select(&state).unwrap() {
        Selection::Convert(indices) => indices,
        Selection::Replace(_) => panic!("composite converts pixels"),
    };
    assert_eq!(picked.len(), 100);
    let from_2 = picked
        .iter()
        .filter(|&&i| state.lulc().get_flat(i).unwrap() == 2)
        .count() as i64;
    assert!((from_2 - 50).abs() <= 1);
    assert!((100 - from_2 - 50).abs() <= 1);
}

#[test]
fn predefined_reads_one_file_per_step() {
    let dir = tempfile::tempdir().unwrap();
    for (step, forest_pixels) in [(0, 4), (1, 3), (2, 1)] {
        let mut values = vec![9; 6];
        values[..forest_pixels].iter_mut().for_each(|v| *v = 1);
        let lulc = Raster::from_vec(values, 2, 3).unwrap();
        write_geotiff(&lulc, dir.path().join(format!("lulc_{}.tif", step))).unwrap();
    }

    let base: Raster<i32> = Raster::filled(2, 3, 0);
    let policy = Predefined::new(dir.path(), "lulc_%n.tif");
    let counts = forest_counts(Box::new(policy), base.clone(), 2, 0);
    assert_eq!(counts, vec![4, 3, 1]);

    // A step file on another grid aborts at that step
    let wrong: Raster<i32> = Raster::filled(3, 3, 1);
    write_geotiff(&wrong, dir.path().join("lulc_2.tif")).unwrap();
    let state = ScenarioState::new(base, 2, 0, 9);
    let mut engine = ScenarioEngine::new(
        state,
        Box::new(Predefined::new(dir.path(), "lulc_%n.tif")),
        vec![Box::new(ForestCount)],
        Vec::new(),
        EngineOptions::default(),
    )
    .unwrap();
    let err = engine.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(matches!(err, Error::AtStep { step: 2, .. }));
}

// ---------------------------------------------------------------------------
// Configured runs
// ---------------------------------------------------------------------------

const ROWS: usize = 20;
const COLS: usize = 20;

fn georeferenced<T: landshift_core::RasterElement>(fill: T, nodata: Option<T>) -> Raster<T> {
    let mut r = Raster::filled(ROWS, COLS, fill);
    r.set_transform(GeoTransform::new(500_000.0, 8_500_000.0, 30.0, -30.0));
    r.set_nodata(nodata);
    r
}

/// Forest (1) on the left, grassland (10) in the middle, cropland (12) on
/// the right, one nodata pixel
fn write_inputs(dir: &Path) {
    let mut lulc = georeferenced(10i32, Some(-1));
    for r in 0..ROWS {
        for c in 0..COLS {
            let code = match c {
                0..=11 => 1,
                12..=15 => 10,
                _ => 12,
            };
            lulc.set(r, c, code).unwrap();
        }
    }
    lulc.set(0, 19, -1).unwrap();
    write_geotiff(&lulc, dir.join("lulc.tif")).unwrap();

    write_geotiff(&georeferenced(100.0f32, Some(-9999.0)), dir.join("biomass.tif")).unwrap();
    write_geotiff(&georeferenced(10.0f32, Some(-9999.0)), dir.join("yieldgap.tif")).unwrap();
    write_geotiff(&georeferenced(9.0f32, Some(-9999.0)), dir.join("potveg.tif")).unwrap();
    write_geotiff(&georeferenced(0.1f32, Some(-9999.0)), dir.join("pasture.tif")).unwrap();

    fs::write(dir.join("pools.csv"), "LULC,C_ABOVE_MEAN\n10,2.0\n12,0.0\n").unwrap();
    fs::write(
        dir.join("reclass.csv"),
        "lulc,globio_broad\n1,130\n10,131\n12,132\n",
    )
    .unwrap();
}

fn config_json(extra: &str) -> String {
    format!(
        r#"{{
            "base_lulc_path": "lulc.tif",
            "base_biomass_path": "biomass.tif",
            "carbon_pool_table_path": "pools.csv",
            "forest_codes": [1],
            "regression_codes": [1],
            "table_codes": [10, 12],
            "reclass_table_path": "reclass.csv",
            "yieldgap_sum_path": "yieldgap.tif",
            "potential_veg_path": "potveg.tif",
            "pasture_path": "pasture.tif",
            "scenario": {{"kind": "edge_expansion"}},
            "converting_code": 12,
            "pixels_per_step": 5,
            "total_steps": 3,
            "evaluators": ["carbon", "msa"],
            "output_csv_path": "out/run.csv"{}
        }}"#,
        extra
    )
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<f64>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(|v| v.parse().unwrap()).collect())
        .collect();
    (header, rows)
}

#[test]
fn configured_carbon_and_msa_run() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let config_path = dir.path().join("run.json");
    fs::write(
        &config_path,
        config_json(r#", "save_maps": "first_last", "map_output_dir": "maps""#),
    )
    .unwrap();

    let config = ScenarioConfig::from_file(&config_path).unwrap();
    let summary = run_scenario(&config).unwrap();
    assert_eq!(summary.steps, 3);
    assert_eq!(summary.converted, 15);

    let (header, rows) = read_rows(&dir.path().join("out/run.csv"));
    assert_eq!(
        header,
        vec!["step", "total_carbon_mg", "avg_msa", "avg_msa_lu", "avg_msa_f"]
    );
    assert_eq!(rows.len(), 4);

    for (k, row) in rows.iter().enumerate() {
        assert_eq!(row[0], k as f64);
        assert!(row[1] >= 0.0);
        for v in &row[2..] {
            assert!((0.0..=1.0).contains(v), "MSA value {v} out of range");
        }
    }

    // 100 Mg/ha on 0.09 ha: every converted forest pixel loses 9 Mg
    for w in rows.windows(2) {
        assert_abs_diff_eq!(w[0][1] - w[1][1], 5.0 * 9.0, epsilon = 1e-3);
        assert!(w[1][2] <= w[0][2] + 1e-9);
    }

    let maps = dir.path().join("maps");
    assert!(maps.join("step_0000_lulc.tif").exists());
    assert!(maps.join("step_0000_carbon.tif").exists());
    assert!(maps.join("step_0003_msa.tif").exists());
    assert!(!maps.join("step_0001_lulc.tif").exists());
}

#[test]
fn per_class_columns_in_configured_run() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let mut config = ScenarioConfig::from_json_str(&config_json(r#", "report_per_class": true"#)).unwrap();
    config.rebase(dir.path());
    run_scenario(&config).unwrap();

    let (header, rows) = read_rows(&dir.path().join("out/run.csv"));
    assert_eq!(
        header,
        vec![
            "step",
            "total_carbon_mg",
            "carbon_mg_1",
            "carbon_mg_10",
            "carbon_mg_12",
            "avg_msa",
            "avg_msa_lu",
            "avg_msa_f",
            "converted_1",
            "converted_10",
            "converted_12",
        ]
    );
    assert_eq!(rows[0][8..], [0.0, 0.0, 0.0]);
    assert_eq!(rows[1][8..], [5.0, 0.0, 0.0]);
    // Class totals add up to the total
    for row in &rows {
        assert_abs_diff_eq!(row[1], row[2] + row[3] + row[4], epsilon = 1e-3);
    }
}

#[test]
fn invalid_configuration_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let mut config = ScenarioConfig::from_json_str(&config_json("")).unwrap();
    config.rebase(dir.path());
    config.pixels_per_step = 0;

    let err = run_scenario(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(!dir.path().join("out/run.csv").exists());
}

#[test]
fn misaligned_input_aborts_before_first_step() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let small: Raster<f32> = Raster::filled(ROWS, COLS - 1, 0.1);
    write_geotiff(&small, dir.path().join("pasture.tif")).unwrap();

    let mut config = ScenarioConfig::from_json_str(&config_json("")).unwrap();
    config.rebase(dir.path());
    let err = run_scenario(&config).unwrap_err();
    assert!(matches!(err, Error::Mismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(!dir.path().join("out/run.csv").exists());
}

#[test]
fn missing_input_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    fs::remove_file(dir.path().join("biomass.tif")).unwrap();

    let mut config = ScenarioConfig::from_json_str(&config_json("")).unwrap();
    config.rebase(dir.path());
    let err = run_scenario(&config).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[test]
fn exhausted_run_keeps_completed_rows() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let mut config = ScenarioConfig::from_json_str(&config_json("")).unwrap();
    config.rebase(dir.path());
    // 240 forest pixels at 100 per step run out during step 3
    config.pixels_per_step = 100;
    config.total_steps = 4;

    let err = run_scenario(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert!(matches!(err, Error::AtStep { step: 4, .. }));

    let (_, rows) = read_rows(&dir.path().join("out/run.csv"));
    assert_eq!(rows.len(), 4);
}

#[test]
fn configured_composite_run_splits_halfway() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());
    let json = config_json(r#", "report_per_class": true"#)
        .replace(
            r#"{"kind": "edge_expansion"}"#,
            r#"{"kind": "composite", "start": {"1": 20, "10": 80}, "end": {"1": 80, "10": 20}}"#,
        )
        .replace(r#""pixels_per_step": 5"#, r#""pixels_per_step": 10"#)
        .replace(r#""total_steps": 3"#, r#""total_steps": 10"#);
    let config_path = dir.path().join("composite.json");
    fs::write(&config_path, json).unwrap();

    let config = ScenarioConfig::from_file(&config_path).unwrap();
    let summary = run_scenario(&config).unwrap();
    assert_eq!(summary.steps, 10);
    assert_eq!(summary.converted, 100);

    let (header, rows) = read_rows(&dir.path().join("out/run.csv"));
    assert_eq!(header[8..], ["converted_1", "converted_10", "converted_12"]);
    assert_eq!(rows.len(), 11);
    assert_eq!(rows[0][8..], [0.0, 0.0, 0.0]);

    // Forest share grows from 20% to 80% while grassland shrinks
    assert_eq!(rows[1][8..], [3.0, 7.0, 0.0]);
    assert_eq!(rows[5][8..], [5.0, 5.0, 0.0]);
    assert_eq!(rows[10][8..], [8.0, 2.0, 0.0]);
    for row in &rows[1..] {
        assert_eq!(row[8] + row[9], 10.0);
        assert_eq!(row[10], 0.0);
    }
}

#[test]
fn cell_size_must_match_base_land_cover() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let mut config = ScenarioConfig::from_json_str(&config_json(r#", "cell_size_m": 100.0"#)).unwrap();
    config.rebase(dir.path());
    let err = run_scenario(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(!dir.path().join("out/run.csv").exists());

    let mut config = ScenarioConfig::from_json_str(&config_json(r#", "cell_size_m": 30.0"#)).unwrap();
    config.rebase(dir.path());
    run_scenario(&config).unwrap();
}
