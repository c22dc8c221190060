//! # Analytic Solver
//!
//! Closed-form stand-in for the finite-element backend. Each hole sees the
//! gross-section far field of the case loads (Kirsch solution for an open
//! hole in an infinite plate) plus, on the main hole, a cosine bearing
//! distribution for the fastener load.
//!
//! ```text
//! sigma_x  = (Fx_rh - Fx_lh) / (2 h th)
//! sigma_y  = (Fy_top - Fy_bot) / (2 w th)
//! tau_xy   = (Fy_rh - Fy_lh) / (2 h th)
//!
//! hole wall (r = a):
//!   sigma_theta = sigma_x (1 - 2 cos 2t) + sigma_y (1 + 2 cos 2t) - 4 tau sin 2t
//!
//! bearing, p = P / (d th), t' from the load direction, decays as (a/r)^2:
//!   sigma_theta = 1.5 |p| sin^2 t' + p cos t'
//!   sigma_r     = -|p| max(0, -sign(p) cos t')
//! ```
//!
//! Neat-fit fasteners carry 90% of the bearing stress. The outer surface of a
//! countersunk hole is amplified by `1 + 0.5 csk / th`. The model is linear in
//! the case loads for loads of one sign per axis, so partial cases superpose
//! to the combined case. It is not a finite-element model.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;

use log::debug;

use super::{
    ExtractionRequest, MaterialModel, ModelGeometry, ModelHandle, Quantity, RawSamples, RawSeries, SampleLocation,
    Solver, Surface,
};
use crate::boundary::{BoundaryPlan, SOLUTION_NAME};
use crate::coupon::{CaseLoads, Configuration, SolutionCase};
use crate::errors::{KtError, KtResult};

/// Maximum number of holes the parameter set describes
const MAX_HOLES: usize = 3;
/// Bearing stress retained with a neat-fit fastener
const NEAT_FIT_BEARING: f64 = 0.9;
/// Outer-surface amplification per unit of countersink depth ratio
const COUNTERSINK_AMPLIFICATION: f64 = 0.5;

struct Model {
    configuration: Configuration,
    parameters: HashMap<String, f64>,
    cases: BTreeMap<SolutionCase, CaseLoads>,
    solved: bool,
}

/// Plane-stress state in polar components
#[derive(Debug, Clone, Copy, Default)]
struct PolarStress {
    sr: f64,
    st: f64,
    trt: f64,
}

impl PolarStress {
    fn add(self, o: PolarStress) -> PolarStress {
        PolarStress {
            sr: self.sr + o.sr,
            st: self.st + o.st,
            trt: self.trt + o.trt,
        }
    }

    fn scale(self, k: f64) -> PolarStress {
        PolarStress {
            sr: self.sr * k,
            st: self.st * k,
            trt: self.trt * k,
        }
    }

    fn max_principal(&self) -> f64 {
        let mean = (self.sr + self.st) / 2.0;
        let radius = (((self.st - self.sr) / 2.0).powi(2) + self.trt.powi(2)).sqrt();
        mean + radius
    }
}

/// Closed-form reference backend.
#[derive(Default)]
pub struct AnalyticSolver {
    next_handle: u64,
    models: HashMap<ModelHandle, Model>,
}

impl AnalyticSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn model(&self, handle: ModelHandle) -> KtResult<&Model> {
        self.models.get(&handle).ok_or_else(|| KtError::Internal {
            message: format!("unknown model handle {:?}", handle),
        })
    }

    fn model_mut(&mut self, handle: ModelHandle) -> KtResult<&mut Model> {
        self.models.get_mut(&handle).ok_or_else(|| KtError::Internal {
            message: format!("unknown model handle {:?}", handle),
        })
    }
}

/// Every parameter name the model defines
fn known_parameters() -> Vec<String> {
    let mut names: Vec<String> = ["w", "h", "th", "Ep", "nu", "neat", "Px", "Py"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for i in 0..MAX_HOLES {
        for prefix in ["d", "x", "y", "Ef", "csk"] {
            names.push(format!("{}{}", prefix, i));
        }
    }
    for component in ["Fx", "Fy", "M"] {
        for edge in ["bot", "lh", "rh", "top"] {
            for group in ["brg", "byp"] {
                names.push(format!("{}_{}_{}", component, edge, group));
            }
        }
    }
    names
}

impl Model {
    fn get(&self, name: &str) -> KtResult<f64> {
        self.parameters
            .get(name)
            .copied()
            .ok_or_else(|| KtError::parameter_not_found(name))
    }

    fn hole_count(&self) -> usize {
        (0..MAX_HOLES)
            .take_while(|i| self.parameters.get(&format!("d{}", i)).copied().unwrap_or(0.0) > 0.0)
            .count()
    }

    /// Stress at polar position (r, theta) about hole `hole` for one case.
    fn stress(&self, hole: usize, loads: &CaseLoads, r: f64, theta: f64) -> KtResult<PolarStress> {
        let w = self.get("w")?;
        let h = self.get("h")?;
        let th = self.get("th")?;
        let a = self.get(&format!("d{}", hole))? / 2.0;
        let edges = loads.edge_totals();

        let sx = (edges.rh.fx - edges.lh.fx) / (2.0 * h * th);
        let sy = (edges.top.fy - edges.bot.fy) / (2.0 * w * th);
        let txy = (edges.rh.fy - edges.lh.fy) / (2.0 * h * th);

        let rho2 = (a / r).powi(2);
        let rho4 = rho2 * rho2;
        let (s2, c2) = (2.0 * theta).sin_cos();

        let uniaxial = |sigma: f64, c2: f64, s2: f64| PolarStress {
            sr: sigma / 2.0 * (1.0 - rho2) + sigma / 2.0 * (1.0 - 4.0 * rho2 + 3.0 * rho4) * c2,
            st: sigma / 2.0 * (1.0 + rho2) - sigma / 2.0 * (1.0 + 3.0 * rho4) * c2,
            trt: -sigma / 2.0 * (1.0 + 2.0 * rho2 - 3.0 * rho4) * s2,
        };
        let shear = PolarStress {
            sr: txy * (1.0 - 4.0 * rho2 + 3.0 * rho4) * s2,
            st: -txy * (1.0 + 3.0 * rho4) * s2,
            trt: txy * (1.0 + 2.0 * rho2 - 3.0 * rho4) * c2,
        };
        let mut total = uniaxial(sx, c2, s2).add(uniaxial(sy, -c2, -s2)).add(shear);

        if hole == 0 && !loads.is_open() {
            let d = 2.0 * a;
            let fit = if self.get("neat")? != 0.0 { NEAT_FIT_BEARING } else { 1.0 };
            // x and y components handled separately to stay linear per sign
            for (p_load, axis) in [(loads.px, 0.0), (loads.py, PI / 2.0)] {
                if p_load == 0.0 {
                    continue;
                }
                let p = p_load / (d * th);
                let c = (theta - axis).cos();
                // Px is the plate reaction: contact on the side opposite its sign
                let bearing = PolarStress {
                    sr: -p.abs() * (-p.signum() * c).max(0.0),
                    st: 1.5 * p.abs() * (1.0 - c * c) + p * c,
                    trt: 0.0,
                };
                total = total.add(bearing.scale(fit * rho2));
            }
        }

        Ok(total)
    }

    fn surface_factor(&self, hole: usize, surface: Surface) -> KtResult<f64> {
        Ok(match surface {
            Surface::MidPlane => 1.0,
            Surface::Outer => {
                let csk = self.get(&format!("csk{}", hole))?;
                1.0 + COUNTERSINK_AMPLIFICATION * csk / self.get("th")?
            }
        })
    }

    fn series(&self, request: &ExtractionRequest) -> KtResult<RawSeries> {
        let loads = self
            .cases
            .get(&request.case)
            .ok_or_else(|| KtError::incomplete(request.case.as_str(), "case not in applied plan"))?;
        let a = self.get(&format!("d{}", request.hole))? / 2.0;
        let r = match request.location {
            SampleLocation::Boundary => a,
            SampleLocation::Offset => a + request.offset_in,
        };
        let e = self.get("Ep")?;
        let nu = self.get("nu")?;
        let factor = self.surface_factor(request.hole, request.surface)?;

        let n = (360.0 / request.angle_step_deg).round() as usize;
        let mut angles = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);
        for k in 0..n {
            let angle = k as f64 * request.angle_step_deg;
            let s = self.stress(request.hole, loads, r, angle.to_radians())?.scale(factor);
            let value = match request.quantity {
                Quantity::Ey => (s.st - nu * s.sr) / e,
                Quantity::S1 | Quantity::Bc => s.max_principal(),
            };
            angles.push(angle);
            values.push(value);
        }

        Ok(RawSeries {
            hole: request.hole,
            quantity: request.quantity,
            case: request.case,
            location: request.location,
            surface: request.surface,
            angles_deg: angles,
            values,
        })
    }
}

impl Solver for AnalyticSolver {
    fn name(&self) -> &str {
        "analytic"
    }

    fn build_model(&mut self, geometry: &ModelGeometry, material: &MaterialModel) -> KtResult<ModelHandle> {
        if geometry.holes.is_empty() || geometry.holes.len() > MAX_HOLES {
            return Err(KtError::invalid_input(
                "holes",
                geometry.holes.len().to_string(),
                format!("Model supports 1 to {} holes", MAX_HOLES),
            ));
        }
        let mut parameters: HashMap<String, f64> = known_parameters().into_iter().map(|n| (n, 0.0)).collect();
        parameters.insert("w".to_string(), geometry.width);
        parameters.insert("h".to_string(), geometry.height);
        parameters.insert("th".to_string(), geometry.thickness);
        parameters.insert("Ep".to_string(), material.plate_modulus);
        parameters.insert("nu".to_string(), material.poisson_ratio);
        parameters.insert("neat".to_string(), if material.neat_fit { 1.0 } else { 0.0 });
        for (i, hole) in geometry.holes.iter().enumerate() {
            parameters.insert(format!("d{}", i), hole.diameter);
            parameters.insert(format!("x{}", i), hole.x);
            parameters.insert(format!("y{}", i), hole.y);
            parameters.insert(format!("Ef{}", i), hole.fastener_modulus);
            parameters.insert(format!("csk{}", i), hole.countersink_depth);
        }

        self.next_handle += 1;
        let handle = ModelHandle(self.next_handle);
        self.models.insert(
            handle,
            Model {
                configuration: geometry.configuration,
                parameters,
                cases: BTreeMap::new(),
                solved: false,
            },
        );
        Ok(handle)
    }

    fn set_parameters(&mut self, handle: ModelHandle, values: &[(String, f64)]) -> KtResult<()> {
        let model = self.model_mut(handle)?;
        for (name, value) in values {
            match model.parameters.get_mut(name) {
                Some(slot) => *slot = *value,
                None => return Err(KtError::parameter_not_found(name.clone())),
            }
        }
        model.solved = false;
        Ok(())
    }

    fn apply_boundary_plan(&mut self, handle: ModelHandle, plan: &BoundaryPlan) -> KtResult<()> {
        let model = self.model_mut(handle)?;
        model.cases = plan
            .cases
            .iter()
            .map(|c| (c.case, c.loads.scaled(c.scale)))
            .collect();
        model.solved = false;
        Ok(())
    }

    fn solve(&mut self, handle: ModelHandle, solution_name: &str) -> KtResult<()> {
        let model = self.model_mut(handle)?;
        if solution_name != SOLUTION_NAME {
            return Err(KtError::divergence(solution_name, "unknown solution"));
        }
        if model.cases.is_empty() {
            return Err(KtError::divergence(solution_name, "no boundary plan applied"));
        }
        for name in ["w", "h", "th", "Ep", "d0"] {
            if !(model.get(name)? > 0.0) {
                return Err(KtError::divergence(solution_name, format!("{} must be positive", name)));
            }
        }
        model.solved = true;
        debug!("analytic solve of {} cases ({} holes)", model.cases.len(), model.hole_count());
        Ok(())
    }

    fn extract(&mut self, handle: ModelHandle, requests: &[ExtractionRequest]) -> KtResult<RawSamples> {
        let model = self.model(handle)?;
        if !model.solved {
            return Err(KtError::incomplete("model", "extract called before a successful solve"));
        }
        let series = requests
            .iter()
            .filter(|r| r.hole < model.hole_count())
            .map(|r| model.series(r))
            .collect::<KtResult<Vec<_>>>()?;
        Ok(RawSamples {
            configuration: model.configuration,
            plate_modulus: model.get("Ep")?,
            requests: requests.to_vec(),
            series,
        })
    }

    fn close_model(&mut self, handle: ModelHandle) -> KtResult<()> {
        self.models.remove(&handle);
        Ok(())
    }
}
