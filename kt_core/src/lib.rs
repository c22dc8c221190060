//! # kt_core - Fastener-Hole Fatigue Analysis Engine
//!
//! `kt_core` prepares a finite-element style stress solution for a plate
//! coupon with fastener holes, reduces the returned stress field to the peak
//! stress concentration (Kts) and its gradient, and turns that into a fatigue
//! margin of safety. All inputs and outputs are JSON-serializable.
//!
//! ## Pipeline
//!
//! ```text
//! Coupon ─► symmetry::classify ─► boundary::plan ─► Solver ─► extraction::extract
//!                                                                   │
//!               margin::margin ◄── analysis::analyze ◄──────────────┘
//! ```
//!
//! The stress solve itself sits behind the [`solver::Solver`] trait.
//! [`solver::AnalyticSolver`] is a closed-form backend for plates that are
//! large compared with the hole.
//!
//! ## Quick Start
//!
//! ```rust
//! use kt_core::coupon::Coupon;
//! use kt_core::pipeline::run_analysis;
//! use kt_core::settings::AnalysisSettings;
//! use kt_core::solver::AnalyticSolver;
//!
//! let mut coupon = Coupon::single_hole(4.0, 4.0, 2.0, 2.0, 0.25, 0.25, 10.3e6, 16.0e6);
//! coupon.loads.bypass.fy = 1000.0;
//!
//! let settings = AnalysisSettings { angle_step_deg: 5.0, ..Default::default() };
//! let report = run_analysis(&mut AnalyticSolver::new(), &coupon, &settings).unwrap();
//! let print = report.print.outcome.as_ref().unwrap();
//! assert!(print.open.kts > 0.0);
//! ```
//!
//! ## Modules
//!
//! - [`coupon`] - Coupon geometry, load channels and load resolution
//! - [`symmetry`] - Load symmetry classifier
//! - [`boundary`] - Boundary condition planner
//! - [`solver`] - Solver contract, sessions and the analytic backend
//! - [`extraction`] - Result extractor
//! - [`analysis`] - Stress-concentration analyzer
//! - [`factors`] - Kts correction factor tables
//! - [`margin`] - Margin calculator
//! - [`pipeline`] - End-to-end runner and report
//! - [`settings`] - Overridable numeric policy
//! - [`units`] - Type-safe unit wrappers
//! - [`errors`] - Structured error types
//! - [`file_io`] - JSON files with atomic saves

pub mod analysis;
pub mod boundary;
pub mod coupon;
pub mod errors;
pub mod extraction;
pub mod factors;
pub mod file_io;
pub mod margin;
pub mod pipeline;
pub mod settings;
pub mod solver;
pub mod symmetry;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use analysis::{analyze, HoleCondition, KtsResult};
pub use boundary::{plan, BoundaryPlan};
pub use coupon::{Configuration, Coupon, LoadInput, SolutionCase};
pub use errors::{AnalysisWarning, KtError, KtResult};
pub use extraction::{extract, ExtractionResult};
pub use margin::{margin, KtdlsTable, MarginResult};
pub use pipeline::{run_analysis, spawn_analysis, AnalysisReport};
pub use settings::AnalysisSettings;
pub use solver::{AnalyticSolver, Solver};
pub use symmetry::{classify, SymmetryCase};
