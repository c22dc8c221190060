//! # Solver Boundary
//!
//! The stress field comes from an external solver. This module defines the
//! narrow contract the pipeline drives it through, the request and raw-sample
//! shapes exchanged with it, and the session lifecycle that keeps one solver
//! round-trip per coupon snapshot.
//!
//! ```text
//! open_session(solver, coupon.id)
//!   └─ build_model ─ set_parameters ─ apply_boundary_plan ─ solve ─ extract
//! close_session()                                   (or drop the session)
//! ```
//!
//! [`AnalyticSolver`] is a closed-form backend implementing the same trait.

pub mod analytic;

pub use analytic::AnalyticSolver;

use std::collections::HashSet;
use std::sync::Mutex;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::boundary::BoundaryPlan;
use crate::coupon::{Configuration, Coupon, HoleGeometry, SolutionCase};
use crate::errors::{KtError, KtResult};

// ============================================================================
// Request vocabulary
// ============================================================================

/// Extracted physical quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    /// In-plane (hoop) strain
    Ey,
    /// Maximum principal stress
    S1,
    /// Principal stress re-extracted along the boundary-condition check path
    Bc,
}

impl Quantity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantity::Ey => "ey",
            Quantity::S1 => "s1",
            Quantity::Bc => "bc",
        }
    }
}

/// Where around the hole a series is sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleLocation {
    /// On the hole wall
    Boundary,
    /// On the sub-surface ring at the offset distance
    Offset,
}

/// Through-thickness surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Surface {
    #[serde(rename = "Mid-Plane")]
    MidPlane,
    #[serde(rename = "Outer")]
    Outer,
}

impl Surface {
    /// Scan order; earlier surfaces win magnitude ties
    pub const ALL: [Surface; 2] = [Surface::MidPlane, Surface::Outer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::MidPlane => "Mid-Plane",
            Surface::Outer => "Outer",
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One series the solver must return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub hole: usize,
    pub quantity: Quantity,
    pub case: SolutionCase,
    pub location: SampleLocation,
    pub surface: Surface,
    /// Radial distance from the hole wall (0 on the boundary), in
    pub offset_in: f64,
    /// Angular sampling step, deg
    pub angle_step_deg: f64,
}

impl ExtractionRequest {
    /// True when `series` answers this request
    pub fn matches(&self, series: &RawSeries) -> bool {
        self.hole == series.hole
            && self.quantity == series.quantity
            && self.case == series.case
            && self.location == series.location
            && self.surface == series.surface
    }
}

/// One raw series as returned by a solver. Angles may be in any order and
/// any 360 deg period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    pub hole: usize,
    pub quantity: Quantity,
    pub case: SolutionCase,
    pub location: SampleLocation,
    pub surface: Surface,
    pub angles_deg: Vec<f64>,
    pub values: Vec<f64>,
}

/// Everything a solver returned for one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSamples {
    pub configuration: Configuration,
    /// Plate modulus used by the model, psi
    pub plate_modulus: f64,
    /// The requests this output answers
    pub requests: Vec<ExtractionRequest>,
    pub series: Vec<RawSeries>,
}

// ============================================================================
// Model description
// ============================================================================

/// Opaque handle to a model built inside a solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHandle(pub u64);

/// Parametrized plate and hole geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelGeometry {
    pub configuration: Configuration,
    pub width: f64,
    pub height: f64,
    pub thickness: f64,
    pub holes: Vec<HoleGeometry>,
}

/// Plate and fastener material description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialModel {
    pub plate_modulus: f64,
    pub poisson_ratio: f64,
    pub neat_fit: bool,
}

impl ModelGeometry {
    /// Geometry and material of one coupon configuration.
    pub fn from_coupon(
        coupon: &Coupon,
        configuration: Configuration,
        default_nu: f64,
    ) -> KtResult<(ModelGeometry, MaterialModel)> {
        let cfg = coupon.hole_configuration(configuration)?;
        Ok((
            ModelGeometry {
                configuration,
                width: coupon.width,
                height: coupon.height,
                thickness: cfg.thickness,
                holes: cfg.holes,
            },
            MaterialModel {
                plate_modulus: coupon.plate_modulus,
                poisson_ratio: coupon.poisson(default_nu),
                neat_fit: cfg.neat_fit,
            },
        ))
    }
}

/// Contract with the external solver.
///
/// Calls for one handle are issued strictly in order:
/// `build_model`, `set_parameters`, `apply_boundary_plan`, `solve`,
/// `extract`, `close_model`.
pub trait Solver {
    /// Short backend name for logs
    fn name(&self) -> &str;

    fn build_model(&mut self, geometry: &ModelGeometry, material: &MaterialModel) -> KtResult<ModelHandle>;

    /// Fails with `ParameterNotFound` for a name the model does not define.
    fn set_parameters(&mut self, handle: ModelHandle, values: &[(String, f64)]) -> KtResult<()>;

    fn apply_boundary_plan(&mut self, handle: ModelHandle, plan: &BoundaryPlan) -> KtResult<()>;

    /// May fail with `SolverDivergence`.
    fn solve(&mut self, handle: ModelHandle, solution_name: &str) -> KtResult<()>;

    fn extract(&mut self, handle: ModelHandle, requests: &[ExtractionRequest]) -> KtResult<RawSamples>;

    fn close_model(&mut self, handle: ModelHandle) -> KtResult<()>;
}

// ============================================================================
// Sessions
// ============================================================================

/// Coupon snapshot ids with an open session
static ACTIVE_SESSIONS: Lazy<Mutex<HashSet<Uuid>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn register(coupon_id: Uuid) -> KtResult<()> {
    let mut active = ACTIVE_SESSIONS
        .lock()
        .map_err(|e| KtError::Internal { message: e.to_string() })?;
    if !active.insert(coupon_id) {
        return Err(KtError::SessionBusy {
            coupon_id: coupon_id.to_string(),
        });
    }
    Ok(())
}

fn release(coupon_id: Uuid) {
    if let Ok(mut active) = ACTIVE_SESSIONS.lock() {
        active.remove(&coupon_id);
    }
}

/// True when a session is open against `coupon_id`
pub fn session_active(coupon_id: Uuid) -> bool {
    ACTIVE_SESSIONS
        .lock()
        .map(|active| active.contains(&coupon_id))
        .unwrap_or(false)
}

/// Exclusive use of a solver for one coupon snapshot.
///
/// The session owns at most one model at a time. Dropping an open session
/// closes its model and releases the coupon.
pub struct SolverSession<'a> {
    solver: &'a mut dyn Solver,
    coupon_id: Uuid,
    model: Option<ModelHandle>,
    open: bool,
}

/// Open a session against a coupon snapshot.
///
/// # Errors
///
/// `SessionBusy` when another session is already open for `coupon_id`.
pub fn open_session(solver: &mut dyn Solver, coupon_id: Uuid) -> KtResult<SolverSession<'_>> {
    register(coupon_id)?;
    info!("opened {} session for coupon {}", solver.name(), coupon_id);
    Ok(SolverSession {
        solver,
        coupon_id,
        model: None,
        open: true,
    })
}

impl<'a> SolverSession<'a> {
    pub fn coupon_id(&self) -> Uuid {
        self.coupon_id
    }

    /// Build a model, closing any model this session already holds.
    pub fn build_model(&mut self, geometry: &ModelGeometry, material: &MaterialModel) -> KtResult<ModelHandle> {
        self.close_model()?;
        let handle = self.solver.build_model(geometry, material)?;
        debug!("built model {:?} ({})", handle, geometry.configuration);
        self.model = Some(handle);
        Ok(handle)
    }

    fn handle(&self) -> KtResult<ModelHandle> {
        self.model.ok_or_else(|| KtError::Internal {
            message: "no model built in this session".to_string(),
        })
    }

    pub fn set_parameters(&mut self, values: &[(String, f64)]) -> KtResult<()> {
        let handle = self.handle()?;
        self.solver.set_parameters(handle, values)
    }

    pub fn apply_boundary_plan(&mut self, plan: &BoundaryPlan) -> KtResult<()> {
        let handle = self.handle()?;
        self.solver.apply_boundary_plan(handle, plan)
    }

    pub fn solve(&mut self, solution_name: &str) -> KtResult<()> {
        let handle = self.handle()?;
        self.solver.solve(handle, solution_name)
    }

    pub fn extract(&mut self, requests: &[ExtractionRequest]) -> KtResult<RawSamples> {
        let handle = self.handle()?;
        self.solver.extract(handle, requests)
    }

    /// Close the current model, if any.
    pub fn close_model(&mut self) -> KtResult<()> {
        match self.model.take() {
            Some(handle) => self.solver.close_model(handle),
            None => Ok(()),
        }
    }

    /// Close the model and release the coupon.
    pub fn close_session(mut self) -> KtResult<()> {
        let result = self.close_model();
        self.finish();
        result
    }

    fn finish(&mut self) {
        if self.open {
            self.open = false;
            release(self.coupon_id);
            info!("closed session for coupon {}", self.coupon_id);
        }
    }
}

impl Drop for SolverSession<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.close_model() {
                warn!("coupon {}: model did not close cleanly: {}", self.coupon_id, e);
            }
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_registry() {
        let mut a = AnalyticSolver::new();
        let mut b = AnalyticSolver::new();
        let id = Uuid::new_v4();

        let session = open_session(&mut a, id).unwrap();
        assert!(session_active(id));
        assert!(matches!(open_session(&mut b, id), Err(KtError::SessionBusy { .. })));

        session.close_session().unwrap();
        assert!(!session_active(id));
        let again = open_session(&mut b, id).unwrap();
        drop(again);
        assert!(!session_active(id));
    }

    #[test]
    fn test_distinct_coupons_do_not_conflict() {
        let mut a = AnalyticSolver::new();
        let mut b = AnalyticSolver::new();
        let s1 = open_session(&mut a, Uuid::new_v4()).unwrap();
        let s2 = open_session(&mut b, Uuid::new_v4()).unwrap();
        drop(s1);
        drop(s2);
    }

    #[test]
    fn test_calls_without_model() {
        let mut a = AnalyticSolver::new();
        let mut session = open_session(&mut a, Uuid::new_v4()).unwrap();
        assert!(session.solve("linear").is_err());
    }

    #[test]
    fn test_surface_names() {
        assert_eq!(serde_json::to_string(&Surface::MidPlane).unwrap(), "\"Mid-Plane\"");
        assert_eq!(Quantity::S1.as_str(), "s1");
    }
}
