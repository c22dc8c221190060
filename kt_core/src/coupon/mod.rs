//! # Coupon Model
//!
//! The coupon is the single input snapshot of an analysis: plate geometry,
//! moduli, hole pattern for the print configuration, an optional repair
//! configuration and the six load channels. Analysis components only ever
//! read it.
//!
//! ```text
//! Coupon
//! ├── kind: SingleHole | SatelliteHole
//! ├── width, height, plate_modulus, poisson_ratio
//! ├── print:  PrintConfig  { holes[], thickness, neat_fit }
//! ├── repair: Option<RepairConfig>   (r_ values, positions shared with print)
//! └── loads:  LoadInput    (bypass, axial-shear, bearing-axial, bearing-shear)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kt_core::coupon::{Coupon, Configuration};
//!
//! let mut coupon = Coupon::single_hole(1.5425, 1.855, 0.492, 0.9275, 0.255, 0.25, 10.3e6, 16.0e6);
//! coupon.loads.bypass.fy = 9809.0;
//! coupon.validate().unwrap();
//!
//! let params = coupon.solver_parameters(Configuration::Print, 0.33).unwrap();
//! assert!(params.iter().any(|(name, v)| name == "Fy_top_byp" && *v == 9809.0));
//! ```

pub mod loads;

pub use loads::{
    AxialShearLoads, BearingAxialLoads, BearingShearLoads, BypassLoads, CaseLoads, Edge, EdgeLoad, EdgeLoads,
    LoadEntryMode, LoadInput, PlateFrame, ResolvedLoads, SolutionCase,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{KtError, KtResult};
use crate::factors::LoadLevel;

/// Hole pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CouponKind {
    #[default]
    SingleHole,
    /// Main hole plus one or two satellite holes
    SatelliteHole,
}

impl CouponKind {
    /// Allowed hole count range
    pub fn hole_count_range(&self) -> (usize, usize) {
        match self {
            CouponKind::SingleHole => (1, 1),
            CouponKind::SatelliteHole => (2, 3),
        }
    }
}

/// Print (as-built) or repair (oversized) configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Configuration {
    Print,
    Repair,
}

impl Configuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Configuration::Print => "print",
            Configuration::Repair => "repair",
        }
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One hole and the fastener installed in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoleGeometry {
    /// Centre x from the bottom-left plate corner (in)
    pub x: f64,
    /// Centre y from the bottom-left plate corner (in)
    pub y: f64,
    /// Hole diameter (in)
    pub diameter: f64,
    /// Fastener modulus (psi)
    pub fastener_modulus: f64,
    /// Countersink depth (in), 0 for a straight-shank hole
    #[serde(default)]
    pub countersink_depth: f64,
}

impl HoleGeometry {
    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}

/// As-built hole pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintConfig {
    pub holes: Vec<HoleGeometry>,
    /// Plate thickness (in)
    pub thickness: f64,
    #[serde(default)]
    pub neat_fit: bool,
}

/// Repair values, one entry per print hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairConfig {
    pub diameters: Vec<f64>,
    pub thickness: f64,
    pub fastener_moduli: Vec<f64>,
    /// Empty means no countersink on any hole
    #[serde(default)]
    pub countersink_depths: Vec<f64>,
    #[serde(default)]
    pub neat_fit: bool,
}

/// Holes, thickness and fit of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleConfiguration {
    pub configuration: Configuration,
    pub holes: Vec<HoleGeometry>,
    pub thickness: f64,
    pub neat_fit: bool,
}

impl HoleConfiguration {
    /// The main (index 0) hole
    pub fn main_hole(&self) -> Option<&HoleGeometry> {
        self.holes.first()
    }
}

/// Input snapshot of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    /// Snapshot id; at most one solver session may be open per id
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub kind: CouponKind,
    /// Plate width along x (in)
    pub width: f64,
    /// Plate height along y (in)
    pub height: f64,
    /// Plate modulus (psi)
    pub plate_modulus: f64,
    /// Falls back to the settings default when absent
    #[serde(default)]
    pub poisson_ratio: Option<f64>,
    pub print: PrintConfig,
    #[serde(default)]
    pub repair: Option<RepairConfig>,
    #[serde(default)]
    pub loads: LoadInput,
    /// Request the corner (45 deg reduced) symmetry path
    #[serde(default)]
    pub corner_mode: bool,
    #[serde(default)]
    pub active_entry_mode: LoadEntryMode,
    /// Aircraft platform, carried to the report
    #[serde(default)]
    pub platform: Option<String>,
    /// Level the entered loads are stated at
    #[serde(default)]
    pub load_level: LoadLevel,
}

impl Coupon {
    /// Single-hole coupon with no loads and no repair.
    #[allow(clippy::too_many_arguments)]
    pub fn single_hole(
        width: f64,
        height: f64,
        x0: f64,
        y0: f64,
        d0: f64,
        thickness: f64,
        plate_modulus: f64,
        fastener_modulus: f64,
    ) -> Self {
        Coupon {
            id: Uuid::new_v4(),
            label: String::new(),
            kind: CouponKind::SingleHole,
            width,
            height,
            plate_modulus,
            poisson_ratio: None,
            print: PrintConfig {
                holes: vec![HoleGeometry {
                    x: x0,
                    y: y0,
                    diameter: d0,
                    fastener_modulus,
                    countersink_depth: 0.0,
                }],
                thickness,
                neat_fit: false,
            },
            repair: None,
            loads: LoadInput::default(),
            corner_mode: false,
            active_entry_mode: LoadEntryMode::default(),
            platform: None,
            load_level: LoadLevel::default(),
        }
    }

    /// Add a satellite hole; the coupon becomes a satellite coupon.
    pub fn with_satellite(mut self, hole: HoleGeometry) -> Self {
        self.kind = CouponKind::SatelliteHole;
        self.print.holes.push(hole);
        self
    }

    /// Attach a repair configuration.
    pub fn with_repair(mut self, repair: RepairConfig) -> Self {
        self.repair = Some(repair);
        self
    }

    /// Poisson ratio, or `default` when the coupon omits it
    pub fn poisson(&self, default: f64) -> f64 {
        self.poisson_ratio.unwrap_or(default)
    }

    /// Frame for moments about the main hole centre.
    pub fn frame(&self) -> PlateFrame {
        let (x0, y0) = self
            .print
            .holes
            .first()
            .map(|h| (h.x, h.y))
            .unwrap_or((self.width / 2.0, self.height / 2.0));
        PlateFrame {
            width: self.width,
            height: self.height,
            x0,
            y0,
        }
    }

    /// Check geometry, hole count, repair vectors and load magnitudes.
    pub fn validate(&self) -> KtResult<()> {
        for (field, value) in [
            ("width", self.width),
            ("height", self.height),
            ("plate_modulus", self.plate_modulus),
            ("thickness", self.print.thickness),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(KtError::invalid_input(field, value.to_string(), "Must be positive"));
            }
        }
        if let Some(nu) = self.poisson_ratio {
            if !(0.0..0.5).contains(&nu) {
                return Err(KtError::invalid_input("poisson_ratio", nu.to_string(), "Must be in [0, 0.5)"));
            }
        }

        let (min, max) = self.kind.hole_count_range();
        let n = self.print.holes.len();
        if n < min || n > max {
            return Err(KtError::invalid_input(
                "holes",
                n.to_string(),
                format!("{:?} coupon needs {} to {} holes", self.kind, min, max),
            ));
        }

        for (i, hole) in self.print.holes.iter().enumerate() {
            if !(hole.diameter > 0.0) {
                return Err(KtError::invalid_input(
                    format!("d{}", i),
                    hole.diameter.to_string(),
                    "Diameter must be positive",
                ));
            }
            if !(hole.fastener_modulus > 0.0) {
                return Err(KtError::invalid_input(
                    format!("Ef{}", i),
                    hole.fastener_modulus.to_string(),
                    "Fastener modulus must be positive",
                ));
            }
            if !(0.0..self.print.thickness).contains(&hole.countersink_depth) {
                return Err(KtError::invalid_input(
                    format!("csk{}", i),
                    hole.countersink_depth.to_string(),
                    "Countersink depth must be in [0, thickness)",
                ));
            }
            let r = hole.radius();
            if hole.x - r <= 0.0 || hole.x + r >= self.width || hole.y - r <= 0.0 || hole.y + r >= self.height {
                return Err(KtError::invalid_input(
                    format!("x{}/y{}", i, i),
                    format!("({}, {})", hole.x, hole.y),
                    "Hole must lie inside the plate",
                ));
            }
        }

        if let Some(repair) = &self.repair {
            self.validate_repair(repair)?;
        }

        self.validate_loads()
    }

    fn validate_repair(&self, repair: &RepairConfig) -> KtResult<()> {
        let n = self.print.holes.len();
        if repair.diameters.len() != n || repair.fastener_moduli.len() != n {
            return Err(KtError::invalid_input(
                "repair",
                format!("{} diameters, {} moduli", repair.diameters.len(), repair.fastener_moduli.len()),
                format!("Repair needs one entry per hole ({})", n),
            ));
        }
        if !repair.countersink_depths.is_empty() && repair.countersink_depths.len() != n {
            return Err(KtError::invalid_input(
                "r_csk",
                repair.countersink_depths.len().to_string(),
                format!("Repair countersinks need one entry per hole ({})", n),
            ));
        }
        if !(repair.thickness.is_finite() && repair.thickness > 0.0) {
            return Err(KtError::invalid_input("r_th", repair.thickness.to_string(), "Must be positive"));
        }
        for (i, (d, hole)) in repair.diameters.iter().zip(&self.print.holes).enumerate() {
            if !d.is_finite() || *d < hole.diameter {
                return Err(KtError::invalid_input(
                    format!("r_d{}", i),
                    d.to_string(),
                    "Repair diameter cannot be smaller than print",
                ));
            }
            let r = d / 2.0;
            if hole.x - r <= 0.0 || hole.x + r >= self.width || hole.y - r <= 0.0 || hole.y + r >= self.height {
                return Err(KtError::invalid_input(
                    format!("r_d{}", i),
                    d.to_string(),
                    "Repair hole must lie inside the plate",
                ));
            }
        }
        for (i, ef) in repair.fastener_moduli.iter().enumerate() {
            if !(ef.is_finite() && *ef > 0.0) {
                return Err(KtError::invalid_input(
                    format!("r_Ef{}", i),
                    ef.to_string(),
                    "Fastener modulus must be positive",
                ));
            }
        }
        for (i, csk) in repair.countersink_depths.iter().enumerate() {
            if !(0.0..repair.thickness).contains(csk) {
                return Err(KtError::invalid_input(
                    format!("r_csk{}", i),
                    csk.to_string(),
                    "Countersink depth must be in [0, repair thickness)",
                ));
            }
        }
        Ok(())
    }

    fn validate_loads(&self) -> KtResult<()> {
        let l = &self.loads;
        let magnitudes = l
            .axial_shear
            .negative()
            .into_iter()
            .chain(l.axial_shear.positive())
            .map(|(e, v)| (format!("v_{}", e), v))
            .chain(
                l.bearing_shear
                    .channels()
                    .into_iter()
                    .map(|(e, v)| (format!("vbs_{}_neg", e), v)),
            )
            .chain([
                ("px_pos".to_string(), l.bearing_axial.px_pos),
                ("px_neg".to_string(), l.bearing_axial.px_neg),
                ("py_pos".to_string(), l.bearing_axial.py_pos),
                ("py_neg".to_string(), l.bearing_axial.py_neg),
            ]);
        for (name, value) in magnitudes {
            if !value.is_finite() || value < 0.0 {
                return Err(KtError::invalid_input(name, value.to_string(), "Load magnitude must be non-negative"));
            }
        }
        Ok(())
    }

    /// Holes, thickness and fit of a configuration. Repair holes keep the
    /// print positions.
    pub fn hole_configuration(&self, configuration: Configuration) -> KtResult<HoleConfiguration> {
        match configuration {
            Configuration::Print => Ok(HoleConfiguration {
                configuration,
                holes: self.print.holes.clone(),
                thickness: self.print.thickness,
                neat_fit: self.print.neat_fit,
            }),
            Configuration::Repair => {
                let repair = self
                    .repair
                    .as_ref()
                    .ok_or_else(|| KtError::configuration("Repair analysis requested but no repair configuration"))?;
                let holes = self
                    .print
                    .holes
                    .iter()
                    .enumerate()
                    .map(|(i, h)| HoleGeometry {
                        x: h.x,
                        y: h.y,
                        diameter: repair.diameters.get(i).copied().unwrap_or(h.diameter),
                        fastener_modulus: repair.fastener_moduli.get(i).copied().unwrap_or(h.fastener_modulus),
                        countersink_depth: repair.countersink_depths.get(i).copied().unwrap_or(0.0),
                    })
                    .collect();
                Ok(HoleConfiguration {
                    configuration,
                    holes,
                    thickness: repair.thickness,
                    neat_fit: repair.neat_fit,
                })
            }
        }
    }

    /// Resolve the load channels into balanced edge loads.
    pub fn resolve_loads(&self) -> ResolvedLoads {
        ResolvedLoads::resolve(&self.loads, self.frame())
    }

    /// Named parameter values handed to the solver model.
    pub fn solver_parameters(&self, configuration: Configuration, default_nu: f64) -> KtResult<Vec<(String, f64)>> {
        let cfg = self.hole_configuration(configuration)?;
        let mut params: Vec<(String, f64)> = Vec::new();

        for (i, hole) in cfg.holes.iter().enumerate() {
            params.push((format!("d{}", i), hole.diameter));
            params.push((format!("x{}", i), hole.x));
            params.push((format!("y{}", i), hole.y));
        }
        params.push(("w".to_string(), self.width));
        params.push(("h".to_string(), self.height));
        params.push(("th".to_string(), cfg.thickness));
        params.push(("Ep".to_string(), self.plate_modulus));
        params.push(("nu".to_string(), self.poisson(default_nu)));
        for (i, hole) in cfg.holes.iter().enumerate() {
            params.push((format!("Ef{}", i), hole.fastener_modulus));
            params.push((format!("csk{}", i), hole.countersink_depth));
        }
        params.push(("neat".to_string(), if cfg.neat_fit { 1.0 } else { 0.0 }));
        params.extend(self.resolve_loads().named_components());
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Coupon {
        let mut c = Coupon::single_hole(1.5425, 1.855, 0.492, 0.9275, 0.255, 0.25, 10.3e6, 16.0e6);
        c.loads.bypass.fy = 9809.0;
        c.loads.bearing_axial.px_neg = 104.0;
        c.loads.bearing_shear.rh_neg = 1289.0;
        c
    }

    #[test]
    fn test_reference_validates() {
        assert!(reference().validate().is_ok());
        assert!(reference().resolve_loads().is_balanced(1.0));
    }

    #[test]
    fn test_hole_outside_plate() {
        let mut c = reference();
        c.print.holes[0].x = 0.1;
        assert!(matches!(c.validate(), Err(KtError::InvalidInput { .. })));
    }

    #[test]
    fn test_hole_count_matches_kind() {
        let mut c = reference();
        c.kind = CouponKind::SatelliteHole;
        assert!(c.validate().is_err());

        let c = reference().with_satellite(HoleGeometry {
            x: 1.1,
            y: 0.9275,
            diameter: 0.19,
            fastener_modulus: 16.0e6,
            countersink_depth: 0.0,
        });
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_negative_magnitude_rejected() {
        let mut c = reference();
        c.loads.bearing_axial.px_pos = -1.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_repair_configuration() {
        let c = reference().with_repair(RepairConfig {
            diameters: vec![0.3125],
            thickness: 0.25,
            fastener_moduli: vec![29.0e6],
            countersink_depths: vec![],
            neat_fit: true,
        });
        assert!(c.validate().is_ok());

        let cfg = c.hole_configuration(Configuration::Repair).unwrap();
        assert_eq!(cfg.holes[0].diameter, 0.3125);
        assert_eq!(cfg.holes[0].x, 0.492);
        assert!(cfg.neat_fit);

        let params = c.solver_parameters(Configuration::Repair, 0.33).unwrap();
        let d0 = params.iter().find(|(n, _)| n == "d0").map(|(_, v)| *v);
        assert_eq!(d0, Some(0.3125));
    }

    #[test]
    fn test_repair_values_checked() {
        let repair = RepairConfig {
            diameters: vec![0.3125],
            thickness: 0.25,
            fastener_moduli: vec![16.0e6],
            countersink_depths: vec![0.1],
            neat_fit: false,
        };
        assert!(reference().with_repair(repair.clone()).validate().is_ok());

        let bad = [
            RepairConfig {
                countersink_depths: vec![0.25],
                ..repair.clone()
            },
            RepairConfig {
                countersink_depths: vec![-0.01],
                ..repair.clone()
            },
            RepairConfig {
                countersink_depths: vec![f64::NAN],
                ..repair.clone()
            },
            RepairConfig {
                diameters: vec![f64::NAN],
                ..repair.clone()
            },
            RepairConfig {
                diameters: vec![1.2],
                ..repair.clone()
            },
            RepairConfig {
                fastener_moduli: vec![0.0],
                ..repair.clone()
            },
            RepairConfig {
                fastener_moduli: vec![f64::NAN],
                ..repair.clone()
            },
            RepairConfig {
                thickness: f64::NAN,
                ..repair.clone()
            },
        ];
        for r in bad {
            let c = reference().with_repair(r.clone());
            assert!(matches!(c.validate(), Err(KtError::InvalidInput { .. })), "{:?}", r);
        }
    }

    #[test]
    fn test_repair_missing() {
        assert!(matches!(
            reference().hole_configuration(Configuration::Repair),
            Err(KtError::Configuration { .. })
        ));
    }

    #[test]
    fn test_solver_parameters() {
        let params = reference().solver_parameters(Configuration::Print, 0.33).unwrap();
        let get = |n: &str| params.iter().find(|(k, _)| k == n).map(|(_, v)| *v);
        assert_eq!(get("w"), Some(1.5425));
        assert_eq!(get("nu"), Some(0.33));
        assert_eq!(get("Px"), Some(-104.0));
        assert_eq!(get("Fy_top_byp"), Some(9809.0));
        // names are unique
        let mut names: Vec<&str> = params.iter().map(|(n, _)| n.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), params.len());
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "width": 2.0, "height": 2.0, "plate_modulus": 10.3e6,
            "print": { "holes": [ { "x": 1.0, "y": 1.0, "diameter": 0.25, "fastener_modulus": 16e6 } ],
                       "thickness": 0.25 }
        }"#;
        let c: Coupon = serde_json::from_str(json).unwrap();
        assert_eq!(c.kind, CouponKind::SingleHole);
        assert!(c.repair.is_none());
        assert!(c.loads.is_zero());
        assert_eq!(c.load_level, LoadLevel::Limit);
        assert!(c.platform.is_none());
        assert!(c.validate().is_ok());
    }
}
