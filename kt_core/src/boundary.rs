//! # Boundary Condition Planner
//!
//! Turns a symmetry case and a coupon configuration into the solver-agnostic
//! plan: named parameters, the constraint set, five labelled solution cases
//! and the series to extract.
//!
//! ```text
//! SymmetryCase ──┐
//!                ├──► BoundaryPlan { parameters, constraint, cases[5], solution, extractions }
//! Coupon ────────┘
//! ```
//!
//! The four partial cases (`byp-pos`, `byp-neg`, `brg-pos`, `brg-neg`) sum to
//! `combined` exactly, because each load channel is assigned to exactly one
//! partial case when the coupon loads are resolved.
//!
//! ## Example
//!
//! ```rust
//! use kt_core::boundary::plan;
//! use kt_core::coupon::{Configuration, Coupon};
//! use kt_core::symmetry::SymmetryCase;
//!
//! let mut coupon = Coupon::single_hole(2.0, 2.0, 1.0, 1.0, 0.25, 0.25, 10.3e6, 16.0e6);
//! coupon.loads.bearing_axial.py_pos = 500.0;
//!
//! let plan = plan(&coupon, SymmetryCase::Bot, Configuration::Print).unwrap();
//! assert_eq!(plan.cases.len(), 5);
//! assert_eq!(plan.constraint.name, "sym");
//! assert!(plan.superposition_residual() < 1e-9);
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::coupon::{CaseLoads, Configuration, Coupon, Edge, SolutionCase};
use crate::errors::{KtError, KtResult};
use crate::settings::{AnalysisSettings, DEFAULT_SETTINGS};
use crate::solver::{ExtractionRequest, Quantity, SampleLocation, Surface};
use crate::symmetry::SymmetryCase;

/// Name of the linear solution registered with the solver
pub const SOLUTION_NAME: &str = "linear";
/// Constraint set name when a symmetry cut is applied
pub const SYMMETRY_CONSTRAINT: &str = "sym";
/// Constraint set name for the statically determinate pin set
pub const RIGID_CONSTRAINT: &str = "rigid";

/// Coordinate system the plan is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReferenceSystem {
    #[default]
    Ref2D,
}

/// Displacement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    X,
    Y,
}

/// Plate corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
}

/// A single displacement constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// Normal displacement fixed along a cut edge
    Symmetry { edge: Edge, direction: Direction },
    /// Point constraint at a plate corner
    Pin { corner: Corner, dofs: Vec<Direction> },
}

/// Named constraint set registered with the solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    pub name: String,
    pub constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// Constraint set for a symmetry case.
    ///
    /// A cut edge fixes its normal displacement. One cut leaves a rigid
    /// translation along the cut, removed with one tangential pin on a corner
    /// of that edge. With no cut the plate is pinned statically determinately:
    /// bottom-left in x and y, bottom-right in y.
    pub fn for_case(case: SymmetryCase) -> ConstraintSet {
        if case.is_unconstrained() {
            return ConstraintSet {
                name: RIGID_CONSTRAINT.to_string(),
                constraints: vec![
                    Constraint::Pin {
                        corner: Corner::BottomLeft,
                        dofs: vec![Direction::X, Direction::Y],
                    },
                    Constraint::Pin {
                        corner: Corner::BottomRight,
                        dofs: vec![Direction::Y],
                    },
                ],
            };
        }

        let edges = case.constrained_edges();
        let mut constraints: Vec<Constraint> = edges
            .iter()
            .map(|&edge| Constraint::Symmetry {
                edge,
                direction: normal_direction(edge),
            })
            .collect();

        if let [edge] = edges.as_slice() {
            let (corner, dof) = match edge {
                Edge::Bot => (Corner::BottomLeft, Direction::X),
                Edge::Top => (Corner::TopLeft, Direction::X),
                Edge::Lh => (Corner::BottomLeft, Direction::Y),
                Edge::Rh => (Corner::BottomRight, Direction::Y),
            };
            constraints.push(Constraint::Pin {
                corner,
                dofs: vec![dof],
            });
        }

        ConstraintSet {
            name: SYMMETRY_CONSTRAINT.to_string(),
            constraints,
        }
    }

    /// Number of constrained rigid-body degrees of freedom
    pub fn pinned_dofs(&self) -> usize {
        self.constraints
            .iter()
            .map(|c| match c {
                Constraint::Symmetry { .. } => 1,
                Constraint::Pin { dofs, .. } => dofs.len(),
            })
            .sum()
    }
}

fn normal_direction(edge: Edge) -> Direction {
    if edge.is_horizontal() {
        Direction::Y
    } else {
        Direction::X
    }
}

/// Solution metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSpec {
    pub name: String,
    pub reference: ReferenceSystem,
    pub linear: bool,
    /// Case the partial cases must superpose to
    pub combined_case: SolutionCase,
    /// Polynomial order range for p-adaptive solvers
    pub p_levels: (u8, u8),
}

impl Default for SolutionSpec {
    fn default() -> Self {
        SolutionSpec {
            name: SOLUTION_NAME.to_string(),
            reference: ReferenceSystem::Ref2D,
            linear: true,
            combined_case: SolutionCase::Combined,
            p_levels: (2, 8),
        }
    }
}

/// Loads and labels of one solution case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionCasePlan {
    pub case: SolutionCase,
    pub load_name: String,
    pub constraint_name: String,
    pub loads: CaseLoads,
    /// Multiplier on `loads`; loads are already signed per case
    pub scale: f64,
}

/// Everything the solver needs to build and solve one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryPlan {
    pub configuration: Configuration,
    pub symmetry: SymmetryCase,
    pub reference: ReferenceSystem,
    pub parameters: Vec<(String, f64)>,
    pub constraint: ConstraintSet,
    pub cases: Vec<SolutionCasePlan>,
    pub solution: SolutionSpec,
    pub extractions: Vec<ExtractionRequest>,
}

impl BoundaryPlan {
    /// Plan of one case
    pub fn case(&self, case: SolutionCase) -> Option<&SolutionCasePlan> {
        self.cases.iter().find(|c| c.case == case)
    }

    /// Largest difference between the summed partial cases and `combined`.
    pub fn superposition_residual(&self) -> f64 {
        let summed = self
            .cases
            .iter()
            .filter(|c| c.case != SolutionCase::Combined)
            .fold(CaseLoads::default(), |acc, c| acc.plus(&c.loads.scaled(c.scale)));
        let combined = match self.case(SolutionCase::Combined) {
            Some(c) => c.loads.scaled(c.scale),
            None => return f64::INFINITY,
        };
        summed
            .bypass
            .max_abs_diff(&combined.bypass)
            .max(summed.bearing.max_abs_diff(&combined.bearing))
            .max((summed.px - combined.px).abs())
            .max((summed.py - combined.py).abs())
    }

    /// `(solution, constraint, load)` ids per case as registered with the solver
    pub fn solution_ids(&self) -> Vec<(String, String, String)> {
        self.cases
            .iter()
            .map(|c| (self.solution.name.clone(), c.constraint_name.clone(), c.load_name.clone()))
            .collect()
    }
}

/// Plan a configuration with the default settings.
pub fn plan(coupon: &Coupon, symmetry: SymmetryCase, configuration: Configuration) -> KtResult<BoundaryPlan> {
    plan_with_settings(coupon, symmetry, configuration, &DEFAULT_SETTINGS)
}

/// Plan a configuration.
///
/// # Errors
///
/// `Configuration` when the repair configuration is requested but absent, or
/// when the resolved loads are out of balance by more than
/// `settings.balance_tolerance_lb`.
pub fn plan_with_settings(
    coupon: &Coupon,
    symmetry: SymmetryCase,
    configuration: Configuration,
    settings: &AnalysisSettings,
) -> KtResult<BoundaryPlan> {
    let hole_count = coupon.hole_configuration(configuration)?.holes.len();
    let resolved = coupon.resolve_loads();
    let (fx, fy, m) = resolved.residual();
    if !resolved.is_balanced(settings.balance_tolerance_lb) {
        return Err(KtError::configuration(format!(
            "Resolved loads out of balance: sum Fx = {:.3}, sum Fy = {:.3}, sum M = {:.3}",
            fx, fy, m
        )));
    }

    let constraint = ConstraintSet::for_case(symmetry);
    let cases = SolutionCase::ALL
        .iter()
        .map(|&case| SolutionCasePlan {
            case,
            load_name: case.as_str().to_string(),
            constraint_name: constraint.name.clone(),
            loads: resolved.split(case),
            scale: 1.0,
        })
        .collect();

    let plan = BoundaryPlan {
        configuration,
        symmetry,
        reference: ReferenceSystem::Ref2D,
        parameters: coupon.solver_parameters(configuration, settings.default_poisson_ratio)?,
        constraint,
        cases,
        solution: SolutionSpec::default(),
        extractions: extraction_requests(hole_count, settings),
    };
    debug!(
        "planned {} / {}: {} parameters, {} extractions",
        configuration,
        symmetry,
        plan.parameters.len(),
        plan.extractions.len()
    );
    Ok(plan)
}

/// Series requested per hole and surface: `ey` on every case at the boundary
/// and offset ring, `s1` on `combined` at both, `bc` on `combined` at the
/// boundary.
pub fn extraction_requests(hole_count: usize, settings: &AnalysisSettings) -> Vec<ExtractionRequest> {
    let mut out = Vec::new();
    for hole in 0..hole_count {
        for surface in Surface::ALL {
            let request = |quantity: Quantity, case: SolutionCase, location: SampleLocation| ExtractionRequest {
                hole,
                quantity,
                case,
                location,
                surface,
                offset_in: match location {
                    SampleLocation::Boundary => 0.0,
                    SampleLocation::Offset => settings.offset_distance_in,
                },
                angle_step_deg: settings.angle_step_deg,
            };
            for location in [SampleLocation::Boundary, SampleLocation::Offset] {
                for case in SolutionCase::ALL {
                    out.push(request(Quantity::Ey, case, location));
                }
                out.push(request(Quantity::S1, SolutionCase::Combined, location));
            }
            out.push(request(Quantity::Bc, SolutionCase::Combined, SampleLocation::Boundary));
        }
    }
    out
}
