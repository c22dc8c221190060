//! # Stress-Concentration Analyzer
//!
//! Reduces an [`ExtractionResult`] to the governing peak stress (Kts), its
//! location, the stress gradient ratio and Kc/Kt, plus a solution-error
//! estimate.
//!
//! ## Condition
//!
//! | Condition | Boundary stress             | Offset stress                    |
//! |-----------|-----------------------------|----------------------------------|
//! | loaded    | `s1-combined`               | `s1-local-combined`              |
//! | open      | `E (ey-byp-pos + ey-byp-neg)` | `E (ey-local-byp-pos + ey-local-byp-neg)` |
//!
//! ## Reduction
//!
//! ```text
//! per angle:   keep the surface with the larger |stress| (Mid-Plane wins ties)
//! per hole:    peak = signed value with the largest |stress| (first wins)
//! governing:   hole with the largest |peak|
//! GR         = offset stress at the peak angle / peak
//! Kc/Kt      = (GR - GR0) / (1 - GR0)
//! ```
//!
//! The solution error is the larger of the `ey` superposition discrepancy
//! (four partial cases against `combined`) and the `s1` against `bc`
//! discrepancy, each `max|delta| / max|reference| * 100`.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::coupon::{Configuration, SolutionCase};
use crate::errors::{AnalysisWarning, KtError, KtResult};
use crate::extraction::{ExtractionResult, SeriesKey};
use crate::settings::AnalysisSettings;
use crate::solver::{Quantity, SampleLocation, Surface};

/// Whether the fastener carries load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HoleCondition {
    Loaded,
    Open,
}

impl HoleCondition {
    pub fn from_flag(loaded: bool) -> Self {
        if loaded {
            HoleCondition::Loaded
        } else {
            HoleCondition::Open
        }
    }
}

/// Where the peak sits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressLocation {
    pub surface: Surface,
    pub angle_deg: f64,
}

impl StressLocation {
    /// `"<surface>, <angle> deg"`, e.g. `"Mid-Plane, 181.0 deg"`
    pub fn label(&self) -> String {
        format!("{}, {:.1} deg", self.surface, self.angle_deg)
    }
}

/// Peak of one hole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleKts {
    pub hole: usize,
    /// Signed peak stress, psi
    pub kts: f64,
    pub location: StressLocation,
    /// Offset stress at the peak angle on the peak surface, psi
    pub offset_stress: f64,
}

/// Governing result of one configuration and condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KtsResult {
    pub configuration: Configuration,
    pub condition: HoleCondition,
    /// Governing hole index
    pub hole: usize,
    /// Signed peak stress, psi
    pub kts: f64,
    pub location: StressLocation,
    pub location_label: String,
    /// `None` when the peak stress is zero
    pub kc_kt: Option<f64>,
    pub gradient_ratio: Option<f64>,
    pub solution_error_pct: f64,
    pub valid: bool,
    pub per_hole: Vec<HoleKts>,
    #[serde(default)]
    pub warnings: Vec<AnalysisWarning>,
}

/// Analyze one condition of an extraction.
///
/// # Errors
///
/// `IncompleteResult` when a series the condition needs is missing.
pub fn analyze(extraction: &ExtractionResult, condition: HoleCondition, settings: &AnalysisSettings) -> KtResult<KtsResult> {
    let mut per_hole = Vec::with_capacity(extraction.hole_count());
    for hole in 0..extraction.hole_count() {
        per_hole.push(hole_peak(extraction, hole, condition)?);
    }

    let governing = per_hole
        .iter()
        .fold(None::<&HoleKts>, |best, h| match best {
            Some(b) if h.kts.abs() <= b.kts.abs() => Some(b),
            _ => Some(h),
        })
        .cloned()
        .ok_or_else(|| KtError::incomplete("holes", "extraction has no holes"))?;

    let mut warnings = Vec::new();
    let (gradient_ratio, kc_kt) = if governing.kts == 0.0 {
        warnings.push(AnalysisWarning::UndefinedRatio {
            quantity: "Kc/Kt".to_string(),
        });
        warn!(
            "{} {:?}: zero peak stress, Kc/Kt undefined",
            extraction.configuration, condition
        );
        (None, None)
    } else {
        let gr = governing.offset_stress / governing.kts;
        let gr0 = settings.kc_kt_zero_gradient_ratio;
        (Some(gr), Some((gr - gr0) / (1.0 - gr0)))
    };

    let solution_error_pct = solution_error(extraction)?;
    let valid = solution_error_pct < settings.solution_error_threshold_pct;
    if !valid {
        warnings.push(AnalysisWarning::SolutionError {
            error_pct: solution_error_pct,
            threshold_pct: settings.solution_error_threshold_pct,
        });
        warn!(
            "{} {:?}: solution error {:.2}% is not below {:.2}%",
            extraction.configuration, condition, solution_error_pct, settings.solution_error_threshold_pct
        );
    }

    let result = KtsResult {
        configuration: extraction.configuration,
        condition,
        hole: governing.hole,
        kts: governing.kts,
        location: governing.location,
        location_label: governing.location.label(),
        kc_kt,
        gradient_ratio,
        solution_error_pct,
        valid,
        per_hole,
        warnings,
    };
    info!(
        "{} {:?}: Kts = {:.1} psi at {} (hole {})",
        result.configuration, condition, result.kts, result.location_label, result.hole
    );
    Ok(result)
}

/// Analyze with the loaded/repair flags as separate inputs.
///
/// # Errors
///
/// `InvalidInput` when `repair` does not match the extraction's configuration.
pub fn analyze_flags(
    extraction: &ExtractionResult,
    loaded: bool,
    repair: bool,
    settings: &AnalysisSettings,
) -> KtResult<KtsResult> {
    let expected = if repair { Configuration::Repair } else { Configuration::Print };
    if extraction.configuration != expected {
        return Err(KtError::invalid_input(
            "repair",
            repair.to_string(),
            format!("extraction holds the {} configuration", extraction.configuration),
        ));
    }
    analyze(extraction, HoleCondition::from_flag(loaded), settings)
}

/// Boundary and offset stress of one hole and surface.
fn condition_stress(
    extraction: &ExtractionResult,
    hole: usize,
    surface: Surface,
    condition: HoleCondition,
    location: SampleLocation,
) -> KtResult<Vec<f64>> {
    match condition {
        HoleCondition::Loaded => {
            let key = SeriesKey::new(Quantity::S1, SolutionCase::Combined, location, surface);
            Ok(extraction.series(hole, &key)?.to_vec())
        }
        HoleCondition::Open => {
            let e = extraction.plate_modulus;
            let strain = extraction.superpose(
                hole,
                Quantity::Ey,
                location,
                surface,
                &[SolutionCase::BypPos, SolutionCase::BypNeg],
            )?;
            Ok(strain.into_iter().map(|ey| e * ey).collect())
        }
    }
}

fn hole_peak(extraction: &ExtractionResult, hole: usize, condition: HoleCondition) -> KtResult<HoleKts> {
    let mut surfaces = Vec::with_capacity(extraction.surfaces.len());
    for &surface in &extraction.surfaces {
        let boundary = condition_stress(extraction, hole, surface, condition, SampleLocation::Boundary)?;
        let offset = condition_stress(extraction, hole, surface, condition, SampleLocation::Offset)?;
        surfaces.push((surface, boundary, offset));
    }

    let mut peak: Option<HoleKts> = None;
    for (k, &angle) in extraction.angles_deg.iter().enumerate() {
        // governing surface at this angle
        let mut best: Option<(Surface, f64, f64)> = None;
        for (surface, boundary, offset) in &surfaces {
            let v = boundary[k];
            if best.map_or(true, |(_, b, _)| v.abs() > b.abs()) {
                best = Some((*surface, v, offset[k]));
            }
        }
        let Some((surface, value, offset)) = best else {
            continue;
        };
        if peak.as_ref().map_or(true, |p| value.abs() > p.kts.abs()) {
            peak = Some(HoleKts {
                hole,
                kts: value,
                location: StressLocation {
                    surface,
                    angle_deg: angle,
                },
                offset_stress: offset,
            });
        }
    }

    let peak = peak.ok_or_else(|| KtError::incomplete(format!("hole {}", hole), "no samples"))?;
    debug!(
        "hole {} {:?}: peak {:.1} psi at {}, offset {:.1} psi",
        hole,
        condition,
        peak.kts,
        peak.location.label(),
        peak.offset_stress
    );
    Ok(peak)
}

/// `max|delta| / max|reference| * 100`; 0 for an all-zero pair, 100 when only
/// the reference is zero.
pub fn relative_error_pct(reference: &[f64], other: &[f64]) -> f64 {
    let max_ref = reference.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let max_delta = reference
        .iter()
        .zip(other)
        .fold(0.0_f64, |m, (a, b)| m.max((a - b).abs()));
    if max_ref == 0.0 {
        if max_delta == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        max_delta / max_ref * 100.0
    }
}

/// Largest discrepancy between independently extracted paths that must agree.
fn solution_error(extraction: &ExtractionResult) -> KtResult<f64> {
    let mut worst = 0.0_f64;
    for hole in 0..extraction.hole_count() {
        for &surface in &extraction.surfaces {
            for location in [SampleLocation::Boundary, SampleLocation::Offset] {
                let combined = extraction.series(
                    hole,
                    &SeriesKey::new(Quantity::Ey, SolutionCase::Combined, location, surface),
                )?;
                let summed = extraction.superpose(hole, Quantity::Ey, location, surface, &SolutionCase::PARTIAL)?;
                worst = worst.max(relative_error_pct(combined, &summed));
            }
            let s1 = extraction.series(
                hole,
                &SeriesKey::new(Quantity::S1, SolutionCase::Combined, SampleLocation::Boundary, surface),
            )?;
            let bc = extraction.series(
                hole,
                &SeriesKey::new(Quantity::Bc, SolutionCase::Combined, SampleLocation::Boundary, surface),
            )?;
            worst = worst.max(relative_error_pct(s1, bc));
        }
    }
    Ok(worst)
}
