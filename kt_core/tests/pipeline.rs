//! End-to-end pipeline tests against the analytic backend and a scripted
//! solver that injects failures.

use std::thread;
use std::time::Duration;

use kt_core::analysis::HoleCondition;
use kt_core::boundary::BoundaryPlan;
use kt_core::coupon::{Configuration, Coupon, RepairConfig, SolutionCase};
use kt_core::errors::{AnalysisWarning, KtError, KtResult};
use kt_core::factors::{FactorTables, MaterialSpec, ThicknessBand};
use kt_core::margin::KtdlsTable;
use kt_core::pipeline::{run_analysis, spawn_analysis};
use kt_core::settings::AnalysisSettings;
use kt_core::solver::{
    open_session, session_active, AnalyticSolver, ExtractionRequest, MaterialModel, ModelGeometry, ModelHandle,
    Quantity, RawSamples, Solver, Surface,
};
use kt_core::symmetry::SymmetryCase;

/// Analytic backend with injectable divergence, dropped series and delay.
#[derive(Default)]
struct ScriptedSolver {
    inner: AnalyticSolver,
    current: Option<Configuration>,
    diverge: Option<Configuration>,
    drop_series: Option<(Configuration, Quantity, SolutionCase)>,
    solve_delay: Duration,
    fail_close: Option<Configuration>,
}

impl Solver for ScriptedSolver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn build_model(&mut self, geometry: &ModelGeometry, material: &MaterialModel) -> KtResult<ModelHandle> {
        self.current = Some(geometry.configuration);
        self.inner.build_model(geometry, material)
    }

    fn set_parameters(&mut self, handle: ModelHandle, values: &[(String, f64)]) -> KtResult<()> {
        self.inner.set_parameters(handle, values)
    }

    fn apply_boundary_plan(&mut self, handle: ModelHandle, plan: &BoundaryPlan) -> KtResult<()> {
        self.inner.apply_boundary_plan(handle, plan)
    }

    fn solve(&mut self, handle: ModelHandle, solution_name: &str) -> KtResult<()> {
        thread::sleep(self.solve_delay);
        if self.diverge.is_some() && self.diverge == self.current {
            return Err(KtError::divergence(solution_name, "p-level 8 did not converge"));
        }
        self.inner.solve(handle, solution_name)
    }

    fn extract(&mut self, handle: ModelHandle, requests: &[ExtractionRequest]) -> KtResult<RawSamples> {
        let mut raw = self.inner.extract(handle, requests)?;
        if let Some((configuration, quantity, case)) = self.drop_series {
            if self.current == Some(configuration) {
                raw.series.retain(|s| !(s.quantity == quantity && s.case == case));
            }
        }
        Ok(raw)
    }

    fn close_model(&mut self, handle: ModelHandle) -> KtResult<()> {
        self.inner.close_model(handle)?;
        if self.fail_close.is_some() && self.fail_close == self.current {
            return Err(KtError::Internal {
                message: "license server dropped the model".to_string(),
            });
        }
        Ok(())
    }
}

fn settings() -> AnalysisSettings {
    AnalysisSettings {
        angle_step_deg: 2.0,
        ..Default::default()
    }
}

fn reference_coupon() -> Coupon {
    let mut c = Coupon::single_hole(1.5425, 1.855, 0.492, 0.9275, 0.255, 0.25, 10.3e6, 16.0e6);
    c.loads.bypass.fy = 9809.0;
    c.loads.bearing_axial.px_neg = 104.0;
    c.loads.bearing_shear.rh_neg = 1289.0;
    c
}

fn with_repair(coupon: Coupon) -> Coupon {
    coupon.with_repair(RepairConfig {
        diameters: vec![0.3125],
        thickness: 0.25,
        fastener_moduli: vec![16.0e6],
        countersink_depths: vec![],
        neat_fit: false,
    })
}

fn reference_tables() -> (FactorTables, MaterialSpec) {
    let mut tables = FactorTables::default();
    tables.fsg.insert("7075-T7351".to_string(), 1.0);
    tables.fg.insert("Plate/L-T".to_string(), 0.97);
    tables.ft.insert(
        "Plate".to_string(),
        vec![ThicknessBand {
            max_thickness: 3.0,
            factor: 0.90,
        }],
    );
    tables.fsf.insert("Machined".to_string(), 1.0);
    tables.fsc.insert("None/Bare".to_string(), 1.0);
    let material = MaterialSpec {
        alloy: "7075-T7351".to_string(),
        form: "Plate".to_string(),
        grain: "L-T".to_string(),
        stock_thickness: 2.5,
        finish: "Machined".to_string(),
        coating: "None".to_string(),
        condition: "Bare".to_string(),
    };
    (tables, material)
}

fn ktdls() -> KtdlsTable {
    KtdlsTable::from_ksi(65.0, 86.0, 129.0)
}

#[test]
fn test_reference_coupon_end_to_end() {
    let coupon = with_repair(reference_coupon());
    let settings = settings();
    let tol = &settings.tolerances;
    let report = run_analysis(&mut AnalyticSolver::new(), &coupon, &settings).unwrap();
    assert_eq!(report.symmetry, SymmetryCase::BotRh);
    assert_eq!(report.symmetry.to_string(), "bot-rh");
    assert_eq!(report.coupon_id, coupon.id);

    // bearing reacts on the right edge, so the loaded peak sits on the left of the hole
    let print = report.print.outcome.as_ref().unwrap();
    assert_eq!(print.loaded.location.surface, Surface::MidPlane);
    assert!(print.loaded.location_label.starts_with("Mid-Plane"), "{}", print.loaded.location_label);
    assert!(
        tol.angle_within(print.loaded.location.angle_deg, 181.0),
        "peak at {}",
        print.loaded.location.angle_deg
    );
    let gr = print.loaded.gradient_ratio.unwrap();
    assert!(tol.gradient_ratio_within(gr, 0.826), "gradient ratio {}", gr);
    let kc_kt = print.loaded.kc_kt.unwrap();
    assert!(tol.kc_kt_within(kc_kt, 0.65), "Kc/Kt {}", kc_kt);
    assert!(print.loaded.solution_error_pct < settings.solution_error_threshold_pct);

    let (tables, material) = reference_tables();
    let report = report.with_margins(&tables, &material, None, &ktdls());

    for configuration in [Configuration::Print, Configuration::Repair] {
        let outcome = report.outcome(configuration).unwrap().as_ref().unwrap();
        assert_eq!(outcome.configuration, configuration);
        assert!(outcome.loaded.valid, "{:?}", outcome.loaded.warnings);
        assert!(outcome.loaded.solution_error_pct < 1e-6);
        assert!(outcome.open.kts != 0.0);
        assert_eq!(outcome.loaded.condition, HoleCondition::Loaded);
        assert_eq!(outcome.open.condition, HoleCondition::Open);
        assert_eq!(outcome.solution_ids.len(), 5);
    }

    let margins = report.print.margins.as_ref().unwrap().as_ref().unwrap();
    let loaded = &margins.loaded;
    assert!((loaded.fkts - 0.873).abs() < 1e-12);
    assert!((loaded.kts_adjusted - loaded.kts * 0.873).abs() < 1e-6);
    let expected = loaded.ktdls / loaded.kts_adjusted - 1.0;
    assert!((loaded.margin_of_safety.unwrap() - expected).abs() < 1e-12);
    assert!(report.repair.as_ref().unwrap().margins.is_some());
    assert!(loaded.margin_of_safety.unwrap() > -1.0);
}

#[test]
fn test_uniaxial_open_hole_is_three_times_far_field() {
    // 1000 lb over 4 in x 0.25 in -> 1000 psi
    let mut coupon = Coupon::single_hole(4.0, 4.0, 2.0, 2.0, 0.25, 0.25, 10.0e6, 16.0e6);
    coupon.loads.bypass.fx = 1000.0;
    let report = run_analysis(&mut AnalyticSolver::new(), &coupon, &settings()).unwrap();
    assert_eq!(report.symmetry, SymmetryCase::None);

    let outcome = report.print.outcome.as_ref().unwrap();
    assert!((outcome.loaded.kts - 3000.0).abs() < 1e-6);
    assert!((outcome.open.kts - 3000.0).abs() < 1e-3);
    assert_eq!(outcome.loaded.location.angle_deg, 90.0);
    let gr = outcome.loaded.gradient_ratio.unwrap();
    assert!(gr > 0.5 && gr < 1.0);
}

#[test]
fn test_zero_load_coupon() {
    let coupon = Coupon::single_hole(2.0, 2.0, 1.0, 1.0, 0.25, 0.25, 10.3e6, 16.0e6);
    let (tables, material) = reference_tables();
    let report = run_analysis(&mut AnalyticSolver::new(), &coupon, &settings())
        .unwrap()
        .with_margins(&tables, &material, None, &ktdls());

    assert_eq!(report.symmetry, SymmetryCase::None);
    let outcome = report.print.outcome.as_ref().unwrap();
    assert_eq!(outcome.loaded.kts, 0.0);
    assert!(outcome.loaded.kc_kt.is_none());

    let margins = report.print.margins.as_ref().unwrap().as_ref().unwrap();
    assert!(margins.loaded.margin_of_safety.is_none());
    assert_eq!(margins.loaded.ktdls, 129_000.0);
    assert!(report.warnings.contains(&AnalysisWarning::ZeroDemand));
}

#[test]
fn test_divergence_aborts_only_that_configuration() {
    let coupon = with_repair(reference_coupon());
    let mut solver = ScriptedSolver {
        diverge: Some(Configuration::Repair),
        ..Default::default()
    };
    let report = run_analysis(&mut solver, &coupon, &settings()).unwrap();
    assert!(report.print.outcome.is_ok());
    assert!(matches!(
        report.repair.as_ref().unwrap().outcome,
        Err(KtError::SolverDivergence { .. })
    ));
    assert!(!session_active(coupon.id));

    let (tables, material) = reference_tables();
    let report = report.with_margins(&tables, &material, None, &ktdls());
    assert!(report.print.margins.is_some());
    assert!(report.repair.as_ref().unwrap().margins.is_none());
}

#[test]
fn test_close_failure_after_divergence_keeps_running() {
    let coupon = with_repair(reference_coupon());
    let mut solver = ScriptedSolver {
        diverge: Some(Configuration::Print),
        fail_close: Some(Configuration::Print),
        ..Default::default()
    };
    let report = run_analysis(&mut solver, &coupon, &settings()).unwrap();
    assert!(matches!(report.print.outcome, Err(KtError::SolverDivergence { .. })));
    assert!(report.repair.as_ref().unwrap().outcome.is_ok());
    assert!(!session_active(coupon.id));
}

#[test]
fn test_missing_series_is_incomplete() {
    let coupon = reference_coupon();
    let mut solver = ScriptedSolver {
        drop_series: Some((Configuration::Print, Quantity::Ey, SolutionCase::BrgNeg)),
        ..Default::default()
    };
    let report = run_analysis(&mut solver, &coupon, &settings()).unwrap();
    assert!(matches!(report.print.outcome, Err(KtError::IncompleteResult { .. })));
}

#[test]
fn test_ambiguous_bearing_aborts_run() {
    let mut coupon = reference_coupon();
    coupon.loads.bearing_axial.px_pos = 50.0;
    assert!(matches!(
        run_analysis(&mut AnalyticSolver::new(), &coupon, &settings()),
        Err(KtError::Configuration { .. })
    ));
}

#[test]
fn test_session_busy() {
    let coupon = reference_coupon();
    let mut holder = AnalyticSolver::new();
    let session = open_session(&mut holder, coupon.id).unwrap();

    let err = run_analysis(&mut AnalyticSolver::new(), &coupon, &settings()).unwrap_err();
    assert!(matches!(err, KtError::SessionBusy { .. }));

    session.close_session().unwrap();
    assert!(run_analysis(&mut AnalyticSolver::new(), &coupon, &settings()).is_ok());
}

#[test]
fn test_worker_timeout() {
    let solver = ScriptedSolver {
        solve_delay: Duration::from_millis(500),
        ..Default::default()
    };
    let handle = spawn_analysis(Box::new(solver), reference_coupon(), settings());
    assert_eq!(
        handle.wait(Duration::from_millis(10)).unwrap_err(),
        KtError::SolverTimeout { seconds: 0 }
    );
}

#[test]
fn test_missing_factor_keeps_kts() {
    let coupon = reference_coupon();
    let report = run_analysis(&mut AnalyticSolver::new(), &coupon, &settings()).unwrap();
    let kts = report.print.outcome.as_ref().unwrap().loaded.kts;

    let (_, material) = reference_tables();
    let report = report.with_margins(&FactorTables::default(), &material, None, &ktdls());
    assert!(matches!(
        report.print.margins,
        Some(Err(KtError::MissingFactor { .. }))
    ));
    assert_eq!(report.print.outcome.as_ref().unwrap().loaded.kts, kts);
}
