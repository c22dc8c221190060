//! # Analysis Pipeline
//!
//! Drives one coupon through classify → plan → solve → extract → analyze for
//! the print configuration and, when present, the repair configuration.
//!
//! ```text
//! Coupon ─► classify ─► ┬─ print  ─► plan ─► solver ─► extract ─► analyze (loaded, open)
//!                       └─ repair ─► plan ─► solver ─► extract ─► analyze (loaded, open)
//!                                                                     │
//!                             AnalysisReport::with_margins ◄──────────┘
//! ```
//!
//! Input errors abort the whole run. Solver-side failures abort only the
//! configuration they occur in and are kept in the report.
//!
//! The solver round-trip is long-running, so [`spawn_analysis`] runs the
//! pipeline on a worker thread, streams [`Progress`] over a channel and lets
//! the caller wait with a timeout.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{analyze, HoleCondition, KtsResult};
use crate::boundary::{plan_with_settings, BoundaryPlan};
use crate::coupon::{Configuration, Coupon};
use crate::errors::{AnalysisWarning, KtError, KtResult};
use crate::extraction::extract;
use crate::factors::{FactorTables, LoadLevel, MaterialSpec};
use crate::margin::{margin_from_tables, KtdlsTable, MarginResult};
use crate::settings::AnalysisSettings;
use crate::solver::{open_session, ModelGeometry, Solver, SolverSession};
use crate::symmetry::{classify_coupon, SymmetryCase};

/// Report format version
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Pipeline stage, reported as progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Plan,
    Build,
    Solve,
    Extract,
    Analyze,
}

/// Progress message from a running analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Progress {
    Classified(SymmetryCase),
    Stage { configuration: Configuration, stage: Stage },
    ConfigurationDone { configuration: Configuration, ok: bool },
    Finished,
}

/// Kts results of one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationOutcome {
    pub configuration: Configuration,
    pub loaded: KtsResult,
    pub open: KtsResult,
    /// `(solution, constraint, load)` ids the solver solved
    pub solution_ids: Vec<(String, String, String)>,
}

/// Margins of one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationMargins {
    pub loaded: MarginResult,
    pub open: MarginResult,
}

/// Kts outcome and optional margins of one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationReport {
    pub outcome: Result<ConfigurationOutcome, KtError>,
    #[serde(default)]
    pub margins: Option<Result<ConfigurationMargins, KtError>>,
}

/// Result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: Uuid,
    pub created: DateTime<Utc>,
    pub version: String,
    pub coupon_id: Uuid,
    #[serde(default)]
    pub platform: Option<String>,
    /// Level the analyzed loads were stated at; Kts is reported at that level
    #[serde(default)]
    pub load_level: LoadLevel,
    #[serde(default = "default_load_safety_factor")]
    pub load_safety_factor: f64,
    pub symmetry: SymmetryCase,
    pub print: ConfigurationReport,
    pub repair: Option<ConfigurationReport>,
    /// Warnings of all Kts and margin results
    pub warnings: Vec<AnalysisWarning>,
}

fn default_load_safety_factor() -> f64 {
    LoadLevel::Limit.safety_factor()
}

impl AnalysisReport {
    fn new(coupon: &Coupon, symmetry: SymmetryCase, print: ConfigurationReport, repair: Option<ConfigurationReport>) -> Self {
        let mut report = AnalysisReport {
            id: Uuid::new_v4(),
            created: Utc::now(),
            version: SCHEMA_VERSION.to_string(),
            coupon_id: coupon.id,
            platform: coupon.platform.clone(),
            load_level: coupon.load_level,
            load_safety_factor: coupon.load_level.safety_factor(),
            symmetry,
            print,
            repair,
            warnings: Vec::new(),
        };
        report.collect_warnings();
        report
    }

    fn reports(&self) -> impl Iterator<Item = &ConfigurationReport> {
        std::iter::once(&self.print).chain(self.repair.iter())
    }

    fn collect_warnings(&mut self) {
        let mut warnings = Vec::new();
        for report in self.reports() {
            if let Ok(outcome) = &report.outcome {
                warnings.extend(outcome.loaded.warnings.iter().cloned());
                warnings.extend(outcome.open.warnings.iter().cloned());
            }
            if let Some(Ok(m)) = &report.margins {
                warnings.extend(m.loaded.warnings.iter().cloned());
                warnings.extend(m.open.warnings.iter().cloned());
            }
        }
        self.warnings = warnings;
    }

    /// Outcome of a configuration, if it was run
    pub fn outcome(&self, configuration: Configuration) -> Option<&Result<ConfigurationOutcome, KtError>> {
        match configuration {
            Configuration::Print => Some(&self.print.outcome),
            Configuration::Repair => self.repair.as_ref().map(|r| &r.outcome),
        }
    }

    /// Attach margins to every successful configuration.
    ///
    /// A margin failure (e.g. `MissingFactor`) is recorded for that
    /// configuration and leaves its Kts outcome untouched. Repair uses
    /// `repair_material` when given, else `print_material`.
    pub fn with_margins(
        mut self,
        tables: &FactorTables,
        print_material: &MaterialSpec,
        repair_material: Option<&MaterialSpec>,
        ktdls: &KtdlsTable,
    ) -> Self {
        self.print.margins = configuration_margins(&self.print, tables, print_material, ktdls);
        if let Some(repair) = self.repair.as_mut() {
            let material = repair_material.unwrap_or(print_material);
            repair.margins = configuration_margins(repair, tables, material, ktdls);
        }
        self.collect_warnings();
        self
    }
}

fn configuration_margins(
    report: &ConfigurationReport,
    tables: &FactorTables,
    material: &MaterialSpec,
    ktdls: &KtdlsTable,
) -> Option<Result<ConfigurationMargins, KtError>> {
    let outcome = report.outcome.as_ref().ok()?;
    let margins = margin_from_tables(&outcome.loaded, tables, material, ktdls).and_then(|loaded| {
        Ok(ConfigurationMargins {
            loaded,
            open: margin_from_tables(&outcome.open, tables, material, ktdls)?,
        })
    });
    if let Err(e) = &margins {
        error!("{} margins failed: {}", outcome.configuration, e);
    }
    Some(margins)
}

/// Run one configuration inside an open session.
pub fn run_configuration(
    session: &mut SolverSession<'_>,
    coupon: &Coupon,
    symmetry: SymmetryCase,
    configuration: Configuration,
    settings: &AnalysisSettings,
) -> KtResult<ConfigurationOutcome> {
    run_configuration_with(session, coupon, symmetry, configuration, settings, &|_| {})
}

fn run_configuration_with(
    session: &mut SolverSession<'_>,
    coupon: &Coupon,
    symmetry: SymmetryCase,
    configuration: Configuration,
    settings: &AnalysisSettings,
    progress: &dyn Fn(Progress),
) -> KtResult<ConfigurationOutcome> {
    let stage = |stage| progress(Progress::Stage { configuration, stage });

    stage(Stage::Plan);
    let plan: BoundaryPlan = plan_with_settings(coupon, symmetry, configuration, settings)?;

    stage(Stage::Build);
    let (geometry, material) = ModelGeometry::from_coupon(coupon, configuration, settings.default_poisson_ratio)?;
    session.build_model(&geometry, &material)?;
    session.set_parameters(&plan.parameters)?;
    session.apply_boundary_plan(&plan)?;

    stage(Stage::Solve);
    session.solve(&plan.solution.name)?;

    stage(Stage::Extract);
    let raw = session.extract(&plan.extractions)?;
    session.close_model()?;
    let extraction = extract(&raw, settings)?;

    stage(Stage::Analyze);
    let loaded = analyze(&extraction, HoleCondition::Loaded, settings)?;
    let open = analyze(&extraction, HoleCondition::Open, settings)?;

    Ok(ConfigurationOutcome {
        configuration,
        loaded,
        open,
        solution_ids: plan.solution_ids(),
    })
}

/// Run the full analysis of a coupon.
///
/// # Errors
///
/// Input errors (`InvalidInput`, `Configuration`, `SessionBusy`) abort the
/// run. Solver-side errors are stored per configuration in the report.
pub fn run_analysis(solver: &mut dyn Solver, coupon: &Coupon, settings: &AnalysisSettings) -> KtResult<AnalysisReport> {
    run_analysis_with(solver, coupon, settings, &|_| {})
}

fn run_analysis_with(
    solver: &mut dyn Solver,
    coupon: &Coupon,
    settings: &AnalysisSettings,
    progress: &dyn Fn(Progress),
) -> KtResult<AnalysisReport> {
    settings.validate()?;
    coupon.validate()?;

    let symmetry = classify_coupon(coupon)?;
    progress(Progress::Classified(symmetry));
    info!("coupon {}: symmetry case {}", coupon.id, symmetry);

    let mut configurations = vec![Configuration::Print];
    if coupon.repair.is_some() {
        configurations.push(Configuration::Repair);
    }

    let mut session = open_session(solver, coupon.id)?;
    let mut reports = Vec::with_capacity(configurations.len());
    for configuration in configurations {
        let outcome = run_configuration_with(&mut session, coupon, symmetry, configuration, settings, progress);
        match &outcome {
            Err(e) if e.aborts_case_only() => {
                error!("{} configuration failed: {}", configuration, e);
                if let Err(close) = session.close_model() {
                    warn!("{} model did not close cleanly: {}", configuration, close);
                }
            }
            Err(e) => {
                error!("{} configuration aborted the run: {}", configuration, e);
                return Err(e.clone());
            }
            Ok(_) => {}
        }
        progress(Progress::ConfigurationDone {
            configuration,
            ok: outcome.is_ok(),
        });
        reports.push(ConfigurationReport { outcome, margins: None });
    }
    session.close_session()?;

    let mut reports = reports.into_iter();
    let print = reports.next().ok_or_else(|| KtError::Internal {
        message: "print configuration was not run".to_string(),
    })?;
    let report = AnalysisReport::new(coupon, symmetry, print, reports.next());
    progress(Progress::Finished);
    Ok(report)
}

/// Handle to an analysis running on a worker thread.
pub struct AnalysisHandle {
    progress: Receiver<Progress>,
    done: Receiver<KtResult<AnalysisReport>>,
}

impl AnalysisHandle {
    /// Progress messages received so far
    pub fn progress(&self) -> Vec<Progress> {
        self.progress.try_iter().collect()
    }

    /// Wait for the analysis to finish.
    ///
    /// # Errors
    ///
    /// `SolverTimeout` when no result arrives within `timeout`. The worker is
    /// not interrupted and its result is discarded.
    pub fn wait(&self, timeout: Duration) -> KtResult<AnalysisReport> {
        match self.done.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(KtError::SolverTimeout {
                seconds: timeout.as_secs(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(KtError::Internal {
                message: "analysis worker exited without a result".to_string(),
            }),
        }
    }
}

/// Run [`run_analysis`] on a worker thread.
pub fn spawn_analysis(
    mut solver: Box<dyn Solver + Send>,
    coupon: Coupon,
    settings: AnalysisSettings,
) -> AnalysisHandle {
    let (progress_tx, progress_rx): (Sender<Progress>, Receiver<Progress>) = mpsc::channel();
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let notify = |p: Progress| {
            let _ = progress_tx.send(p);
        };
        let result = run_analysis_with(solver.as_mut(), &coupon, &settings, &notify);
        let _ = done_tx.send(result);
    });
    AnalysisHandle {
        progress: progress_rx,
        done: done_rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::AnalyticSolver;

    fn coupon() -> Coupon {
        let mut c = Coupon::single_hole(2.0, 2.0, 1.0, 1.0, 0.25, 0.25, 10.3e6, 16.0e6);
        c.loads.bypass.fy = 1000.0;
        c.loads.bearing_axial.py_pos = 200.0;
        c
    }

    fn coarse() -> AnalysisSettings {
        AnalysisSettings {
            angle_step_deg: 5.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_print_only_run() {
        let mut solver = AnalyticSolver::new();
        let report = run_analysis(&mut solver, &coupon(), &coarse()).unwrap();
        assert_eq!(report.symmetry, SymmetryCase::Bot);
        assert!(report.repair.is_none());
        let outcome = report.print.outcome.as_ref().unwrap();
        assert!(outcome.loaded.valid);
        assert!(outcome.loaded.kts > 0.0);
        assert_eq!(outcome.solution_ids.len(), 5);
        assert_eq!(report.version, SCHEMA_VERSION);
        assert_eq!(report.load_level, LoadLevel::Limit);
        assert!((report.load_safety_factor - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_report_carries_platform_and_load_level() {
        let mut c = coupon();
        c.platform = Some("F/A-18E".to_string());
        c.load_level = LoadLevel::Ultimate;
        let report = run_analysis(&mut AnalyticSolver::new(), &c, &coarse()).unwrap();
        assert_eq!(report.platform.as_deref(), Some("F/A-18E"));
        assert_eq!(report.load_level, LoadLevel::Ultimate);
        assert!((report.load_safety_factor - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_configuration_error_aborts() {
        let mut c = coupon();
        c.loads.bearing_axial.py_neg = 10.0;
        let mut solver = AnalyticSolver::new();
        assert!(matches!(
            run_analysis(&mut solver, &c, &coarse()),
            Err(KtError::Configuration { .. })
        ));
    }

    #[test]
    fn test_spawn_reports_progress() {
        let handle = spawn_analysis(Box::new(AnalyticSolver::new()), coupon(), coarse());
        let report = handle.wait(Duration::from_secs(30)).unwrap();
        assert_eq!(report.symmetry, SymmetryCase::Bot);

        let progress = handle.progress();
        assert_eq!(progress.first(), Some(&Progress::Classified(SymmetryCase::Bot)));
        assert_eq!(progress.last(), Some(&Progress::Finished));
        assert!(progress.contains(&Progress::ConfigurationDone {
            configuration: Configuration::Print,
            ok: true
        }));
    }
}
