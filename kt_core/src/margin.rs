//! # Margin Calculator
//!
//! Combines the governing Kts with correction factors and the KtDLS allowable
//! into a margin of safety:
//!
//! ```text
//! Kts_adjusted = Kts × Fkts
//! KtDLS        = piecewise-linear over Kc/Kt ∈ {0.0, 0.5, 1.0}
//! MoS          = KtDLS / Kts_adjusted − 1
//! ```
//!
//! Out-of-range and undefined Kc/Kt are clamped and reported as warnings,
//! never as errors. A zero or compressive Kts_adjusted yields no margin.
//!
//! ## Example
//!
//! ```rust
//! use kt_core::margin::KtdlsTable;
//!
//! let table = KtdlsTable::from_ksi(65.0, 86.0, 129.0);
//! let (ktdls, _, warning) = table.interpolate(Some(0.5));
//! assert_eq!(ktdls, 86_000.0);
//! assert!(warning.is_none());
//! ```

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::{HoleCondition, KtsResult};
use crate::coupon::Configuration;
use crate::errors::{AnalysisWarning, KtError, KtResult};
use crate::factors::{lookup_factors, CorrectionFactors, FactorTables, MaterialSpec};
use crate::units::{Ksi, Psi};

/// KtDLS reference allowables at Kc/Kt = 0, 0.5 and 1 (psi).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KtdlsTable {
    pub at_zero: f64,
    pub at_half: f64,
    pub at_one: f64,
}

impl KtdlsTable {
    /// Reference entry in ksi, ordered as Kc/Kt = 1.0, 0.5, 0.0.
    pub fn from_ksi(at_one: f64, at_half: f64, at_zero: f64) -> Self {
        KtdlsTable {
            at_zero: Psi::from(Ksi(at_zero)).value(),
            at_half: Psi::from(Ksi(at_half)).value(),
            at_one: Psi::from(Ksi(at_one)).value(),
        }
    }

    /// Interpolate at `kc_kt`.
    ///
    /// Returns the allowable, the ratio actually used, and a warning when the
    /// ratio was clamped into [0, 1] or undefined (taken as 0).
    pub fn interpolate(&self, kc_kt: Option<f64>) -> (f64, f64, Option<AnalysisWarning>) {
        let (used, warning) = match kc_kt {
            None => (
                0.0,
                Some(AnalysisWarning::UndefinedRatio {
                    quantity: "Kc/Kt".to_string(),
                }),
            ),
            Some(r) if !(0.0..=1.0).contains(&r) => {
                let clamped = if r.is_nan() { 0.0 } else { r.clamp(0.0, 1.0) };
                (
                    clamped,
                    Some(AnalysisWarning::OutOfRange {
                        quantity: "Kc/Kt".to_string(),
                        value: r,
                        clamped_to: clamped,
                        min: 0.0,
                        max: 1.0,
                    }),
                )
            }
            Some(r) => (r, None),
        };

        let value = if used == 0.0 {
            self.at_zero
        } else if used < 0.5 {
            self.at_zero + (self.at_half - self.at_zero) * (used / 0.5)
        } else if used == 0.5 {
            self.at_half
        } else if used < 1.0 {
            self.at_half + (self.at_one - self.at_half) * ((used - 0.5) / 0.5)
        } else {
            self.at_one
        };
        (value, used, warning)
    }

    pub fn validate(&self) -> KtResult<()> {
        for (field, value) in [("ktdls_0", self.at_zero), ("ktdls_0.5", self.at_half), ("ktdls_1", self.at_one)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(KtError::invalid_input(field, value.to_string(), "Allowable must be positive"));
            }
        }
        Ok(())
    }
}

/// Terminal result of the pipeline for one configuration and condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginResult {
    pub configuration: Configuration,
    pub condition: HoleCondition,
    pub fkts: f64,
    pub factors: CorrectionFactors,
    /// Peak stress, psi
    pub kts: f64,
    pub kts_adjusted: f64,
    /// Interpolated allowable, psi
    pub ktdls: f64,
    pub kc_kt_used: f64,
    /// `None` when `kts_adjusted` is zero
    pub margin_of_safety: Option<f64>,
    pub warnings: Vec<AnalysisWarning>,
}

/// Margin of safety of one Kts result.
///
/// # Errors
///
/// `InvalidInput` for non-positive factors or allowables.
pub fn margin(kts: &KtsResult, factors: &CorrectionFactors, table: &KtdlsTable) -> KtResult<MarginResult> {
    factors.validate()?;
    table.validate()?;

    let fkts = factors.fkts();
    let kts_adjusted = kts.kts * fkts;
    let (ktdls, kc_kt_used, interp_warning) = table.interpolate(kts.kc_kt);

    let mut warnings = Vec::new();
    if let Some(w) = interp_warning {
        warn!("{} {:?}: {}", kts.configuration, kts.condition, w);
        warnings.push(w);
    }

    let margin_of_safety = if kts_adjusted == 0.0 {
        warn!("{} {:?}: adjusted Kts is zero, no margin", kts.configuration, kts.condition);
        warnings.push(AnalysisWarning::ZeroDemand);
        None
    } else if kts_adjusted < 0.0 {
        let w = AnalysisWarning::CompressiveDemand { kts_adjusted };
        warn!("{} {:?}: {}", kts.configuration, kts.condition, w);
        warnings.push(w);
        None
    } else {
        Some(ktdls / kts_adjusted - 1.0)
    };

    info!(
        "{} {:?}: Fkts = {:.4}, Kts_adj = {:.1}, KtDLS = {:.1}, MoS = {:?}",
        kts.configuration, kts.condition, fkts, kts_adjusted, ktdls, margin_of_safety
    );

    Ok(MarginResult {
        configuration: kts.configuration,
        condition: kts.condition,
        fkts,
        factors: *factors,
        kts: kts.kts,
        kts_adjusted,
        ktdls,
        kc_kt_used,
        margin_of_safety,
        warnings,
    })
}

/// Look up the factors for `material`, then compute the margin.
///
/// # Errors
///
/// `MissingFactor` when a table has no entry for the material.
pub fn margin_from_tables(
    kts: &KtsResult,
    tables: &FactorTables,
    material: &MaterialSpec,
    table: &KtdlsTable,
) -> KtResult<MarginResult> {
    let factors = lookup_factors(tables, material)?;
    margin(kts, &factors, table)
}
