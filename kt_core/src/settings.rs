//! # Analysis Settings
//!
//! Every numeric policy constant used by the pipeline lives here so it can be
//! overridden from a JSON file instead of being baked into the algorithms.
//!
//! ```text
//! AnalysisSettings
//! ├── solution_error_threshold_pct   (5.0)
//! ├── angle_step_deg                 (1.0  -> 360 samples per hole)
//! ├── offset_distance_in             (0.01 -> sub-surface ring)
//! ├── kc_kt_zero_gradient_ratio      (0.5)
//! ├── solver_timeout_secs            (120)
//! ├── balance_tolerance_lb           (1.0)
//! ├── default_poisson_ratio          (0.33)
//! └── tolerances: AcceptanceTolerances
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kt_core::settings::AnalysisSettings;
//!
//! // Partial JSON falls back to defaults for everything omitted.
//! let settings: AnalysisSettings =
//!     serde_json::from_str(r#"{ "solution_error_threshold_pct": 2.5 }"#).unwrap();
//! assert_eq!(settings.solution_error_threshold_pct, 2.5);
//! assert_eq!(settings.samples_per_hole(), 360);
//! ```

use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::{KtError, KtResult};

/// Shared default settings instance
pub static DEFAULT_SETTINGS: Lazy<AnalysisSettings> = Lazy::new(AnalysisSettings::default);

/// Overridable pipeline constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Solution error (percent) at or above which a Kts result is flagged
    pub solution_error_threshold_pct: f64,

    /// Angular sampling step around each hole boundary, degrees
    pub angle_step_deg: f64,

    /// Radial distance from the hole wall of the sub-surface sample ring, inches
    pub offset_distance_in: f64,

    /// Gradient ratio mapped to Kc/Kt = 0 (Kc/Kt = 1 at gradient ratio 1)
    pub kc_kt_zero_gradient_ratio: f64,

    /// Completion timeout for one solver round-trip, seconds
    pub solver_timeout_secs: u64,

    /// Allowed force/moment imbalance of a resolved coupon, lb (lb-in for moment)
    pub balance_tolerance_lb: f64,

    /// Poisson ratio used when a coupon does not specify one
    pub default_poisson_ratio: f64,

    /// Acceptance tolerances for comparing results against reference values
    pub tolerances: AcceptanceTolerances,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            solution_error_threshold_pct: 5.0,
            angle_step_deg: 1.0,
            offset_distance_in: 0.01,
            kc_kt_zero_gradient_ratio: 0.5,
            solver_timeout_secs: 120,
            balance_tolerance_lb: 1.0,
            default_poisson_ratio: 0.33,
            tolerances: AcceptanceTolerances::default(),
        }
    }
}

impl AnalysisSettings {
    /// Number of samples on a full 0-360 deg sweep.
    pub fn samples_per_hole(&self) -> usize {
        (360.0 / self.angle_step_deg).round() as usize
    }

    /// Solver completion timeout as a `Duration`.
    pub fn solver_timeout(&self) -> Duration {
        Duration::from_secs(self.solver_timeout_secs)
    }

    /// Validate that the constants are usable.
    pub fn validate(&self) -> KtResult<()> {
        if !(self.angle_step_deg > 0.0 && self.angle_step_deg <= 90.0) {
            return Err(KtError::invalid_input(
                "angle_step_deg",
                self.angle_step_deg.to_string(),
                "Angle step must be in (0, 90] deg",
            ));
        }
        let n = 360.0 / self.angle_step_deg;
        if (n - n.round()).abs() > 1e-9 {
            return Err(KtError::invalid_input(
                "angle_step_deg",
                self.angle_step_deg.to_string(),
                "Angle step must divide 360 deg evenly",
            ));
        }
        if !(self.offset_distance_in.is_finite() && self.offset_distance_in > 0.0) {
            return Err(KtError::invalid_input(
                "offset_distance_in",
                self.offset_distance_in.to_string(),
                "Offset distance must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.kc_kt_zero_gradient_ratio) {
            return Err(KtError::invalid_input(
                "kc_kt_zero_gradient_ratio",
                self.kc_kt_zero_gradient_ratio.to_string(),
                "Must be in [0, 1)",
            ));
        }
        if !(self.solution_error_threshold_pct.is_finite() && self.solution_error_threshold_pct > 0.0) {
            return Err(KtError::invalid_input(
                "solution_error_threshold_pct",
                self.solution_error_threshold_pct.to_string(),
                "Threshold must be positive",
            ));
        }
        if !(self.balance_tolerance_lb.is_finite() && self.balance_tolerance_lb >= 0.0) {
            return Err(KtError::invalid_input(
                "balance_tolerance_lb",
                self.balance_tolerance_lb.to_string(),
                "Tolerance must be non-negative",
            ));
        }
        if !(0.0..0.5).contains(&self.default_poisson_ratio) {
            return Err(KtError::invalid_input(
                "default_poisson_ratio",
                self.default_poisson_ratio.to_string(),
                "Must be in [0, 0.5)",
            ));
        }
        self.tolerances.validate()?;
        Ok(())
    }
}

/// Tolerances used when checking results against reference acceptance values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceTolerances {
    /// Peak stress tolerance, psi
    pub kts_psi: f64,
    /// Peak location tolerance, degrees
    pub angle_deg: f64,
    /// Kc/Kt tolerance
    pub kc_kt: f64,
    /// Gradient ratio tolerance
    pub gradient_ratio: f64,
    /// Margin of safety / correction factor tolerance
    pub margin: f64,
}

impl Default for AcceptanceTolerances {
    fn default() -> Self {
        AcceptanceTolerances {
            kts_psi: 1000.0,
            angle_deg: 5.0,
            kc_kt: 0.10,
            gradient_ratio: 0.10,
            margin: 1e-3,
        }
    }
}

impl AcceptanceTolerances {
    fn validate(&self) -> KtResult<()> {
        for (field, value) in [
            ("tolerances.kts_psi", self.kts_psi),
            ("tolerances.angle_deg", self.angle_deg),
            ("tolerances.kc_kt", self.kc_kt),
            ("tolerances.gradient_ratio", self.gradient_ratio),
            ("tolerances.margin", self.margin),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(KtError::invalid_input(field, value.to_string(), "Tolerance must be non-negative"));
            }
        }
        Ok(())
    }

    pub fn kts_within(&self, actual: f64, expected: f64) -> bool {
        (actual - expected).abs() <= self.kts_psi
    }

    /// Angular distance is taken the short way round, so 359 and 1 deg are 2 apart.
    pub fn angle_within(&self, actual_deg: f64, expected_deg: f64) -> bool {
        let d = (actual_deg - expected_deg).rem_euclid(360.0);
        d.min(360.0 - d) <= self.angle_deg
    }

    pub fn kc_kt_within(&self, actual: f64, expected: f64) -> bool {
        (actual - expected).abs() <= self.kc_kt
    }

    pub fn gradient_ratio_within(&self, actual: f64, expected: f64) -> bool {
        (actual - expected).abs() <= self.gradient_ratio
    }

    pub fn margin_within(&self, actual: f64, expected: f64) -> bool {
        (actual - expected).abs() <= self.margin
    }
}
