//! # Result Extractor
//!
//! Maps raw solver output onto fixed-shape named series. Every series of an
//! [`ExtractionResult`] shares one ascending angle grid `0, step, ..., 360 - step`,
//! so series can be compared and superposed elementwise.
//!
//! ## Naming
//!
//! | Location | Mid-Plane         | Other surfaces             |
//! |----------|-------------------|----------------------------|
//! | boundary | `ey-byp-pos`      | `ey-byp-pos@Outer`         |
//! | offset   | `ey-local-byp-pos`| `ey-local-byp-pos@Outer`   |
//!
//! ## Example
//!
//! ```rust
//! use kt_core::coupon::SolutionCase;
//! use kt_core::extraction::SeriesKey;
//! use kt_core::solver::{Quantity, SampleLocation, Surface};
//!
//! let key = SeriesKey::new(Quantity::S1, SolutionCase::Combined, SampleLocation::Offset, Surface::MidPlane);
//! assert_eq!(key.name(), "s1-local-combined");
//! ```

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::coupon::{Configuration, SolutionCase};
use crate::errors::{KtError, KtResult};
use crate::settings::AnalysisSettings;
use crate::solver::{ExtractionRequest, Quantity, RawSamples, RawSeries, SampleLocation, Surface};

/// Angle tolerance when matching samples to the grid, deg
pub const ANGLE_TOLERANCE_DEG: f64 = 1e-6;

/// Identifies one series of one hole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub quantity: Quantity,
    pub case: SolutionCase,
    pub location: SampleLocation,
    pub surface: Surface,
}

impl SeriesKey {
    pub fn new(quantity: Quantity, case: SolutionCase, location: SampleLocation, surface: Surface) -> Self {
        SeriesKey {
            quantity,
            case,
            location,
            surface,
        }
    }

    pub fn name(&self) -> String {
        let base = match self.location {
            SampleLocation::Boundary => format!("{}-{}", self.quantity.as_str(), self.case.as_str()),
            SampleLocation::Offset => format!("{}-local-{}", self.quantity.as_str(), self.case.as_str()),
        };
        match self.surface {
            Surface::MidPlane => base,
            other => format!("{}@{}", base, other.as_str()),
        }
    }

    fn of_request(r: &ExtractionRequest) -> Self {
        SeriesKey::new(r.quantity, r.case, r.location, r.surface)
    }
}

/// Named series of one hole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleSeries {
    pub hole: usize,
    pub series: BTreeMap<String, Vec<f64>>,
}

/// Normalized solver output of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub configuration: Configuration,
    /// Plate modulus of the model, psi
    pub plate_modulus: f64,
    /// Shared ascending angle grid, deg
    pub angles_deg: Vec<f64>,
    /// Surfaces present, in scan order
    pub surfaces: Vec<Surface>,
    pub holes: Vec<HoleSeries>,
}

impl ExtractionResult {
    pub fn hole_count(&self) -> usize {
        self.holes.len()
    }

    /// One series
    ///
    /// # Errors
    ///
    /// `IncompleteResult` when the hole or series is absent, or when the
    /// series length differs from the angle grid.
    pub fn series(&self, hole: usize, key: &SeriesKey) -> KtResult<&[f64]> {
        let name = key.name();
        let values = self
            .holes
            .get(hole)
            .and_then(|h| h.series.get(&name))
            .ok_or_else(|| KtError::incomplete(format!("hole {} {}", hole, name), "series not extracted"))?;
        if values.len() != self.angles_deg.len() {
            return Err(KtError::incomplete(
                format!("hole {} {}", hole, name),
                format!("{} samples for {} angles", values.len(), self.angles_deg.len()),
            ));
        }
        Ok(values.as_slice())
    }

    /// Series names of one hole, sorted
    pub fn names(&self, hole: usize) -> Vec<&str> {
        self.holes
            .get(hole)
            .map(|h| h.series.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default()
    }

    /// Elementwise sum of `quantity` over `cases`.
    pub fn superpose(
        &self,
        hole: usize,
        quantity: Quantity,
        location: SampleLocation,
        surface: Surface,
        cases: &[SolutionCase],
    ) -> KtResult<Vec<f64>> {
        let mut sum = vec![0.0; self.angles_deg.len()];
        for &case in cases {
            let values = self.series(hole, &SeriesKey::new(quantity, case, location, surface))?;
            for (acc, v) in sum.iter_mut().zip(values) {
                *acc += v;
            }
        }
        Ok(sum)
    }
}

/// Normalize raw solver output onto the fixed angle grid.
///
/// # Errors
///
/// `IncompleteResult` when a requested series is missing or duplicated, has
/// the wrong number of samples, holds a non-finite value, or has an angle
/// that does not land on the grid.
pub fn extract(raw: &RawSamples, settings: &AnalysisSettings) -> KtResult<ExtractionResult> {
    let n = settings.samples_per_hole();
    let step = settings.angle_step_deg;
    let angles_deg: Vec<f64> = (0..n).map(|k| k as f64 * step).collect();

    let hole_count = raw.requests.iter().map(|r| r.hole + 1).max().unwrap_or(0);
    if hole_count == 0 {
        return Err(KtError::incomplete("requests", "no series requested"));
    }
    let mut holes: Vec<HoleSeries> = (0..hole_count)
        .map(|hole| HoleSeries {
            hole,
            series: BTreeMap::new(),
        })
        .collect();
    let mut surfaces: Vec<Surface> = Vec::new();

    for request in &raw.requests {
        let key = SeriesKey::of_request(request);
        let label = format!("hole {} {}", request.hole, key.name());
        let mut matches = raw.series.iter().filter(|s| request.matches(s));
        let series = match (matches.next(), matches.next()) {
            (Some(s), None) => s,
            (None, _) => return Err(KtError::incomplete(label, "missing from solver output")),
            (Some(_), Some(_)) => return Err(KtError::incomplete(label, "returned more than once")),
        };
        let values = normalize(series, n, step).map_err(|reason| KtError::incomplete(label, reason))?;
        holes[request.hole].series.insert(key.name(), values);
        if !surfaces.contains(&request.surface) {
            surfaces.push(request.surface);
        }
    }
    surfaces.sort();

    let unrequested = raw
        .series
        .iter()
        .filter(|s| !raw.requests.iter().any(|r| r.matches(s)))
        .count();
    if unrequested > 0 {
        debug!("ignored {} unrequested series", unrequested);
    }
    debug!(
        "extracted {} series for {} holes ({})",
        raw.requests.len(),
        hole_count,
        raw.configuration
    );

    Ok(ExtractionResult {
        configuration: raw.configuration,
        plate_modulus: raw.plate_modulus,
        angles_deg,
        surfaces,
        holes,
    })
}

/// Sort a series by angle in [0, 360) and check it fills the grid exactly once.
fn normalize(series: &RawSeries, n: usize, step: f64) -> Result<Vec<f64>, String> {
    if series.angles_deg.len() != series.values.len() {
        return Err(format!(
            "{} angles but {} values",
            series.angles_deg.len(),
            series.values.len()
        ));
    }
    if series.values.len() != n {
        return Err(format!("expected {} samples, got {}", n, series.values.len()));
    }

    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);
    for (&angle, &value) in series.angles_deg.iter().zip(&series.values) {
        if !angle.is_finite() || !value.is_finite() {
            return Err(format!("non-finite sample at {} deg", angle));
        }
        let mut a = angle.rem_euclid(360.0);
        if 360.0 - a <= ANGLE_TOLERANCE_DEG {
            a = 0.0;
        }
        pairs.push((a, value));
    }
    pairs.sort_by(|x, y| x.0.total_cmp(&y.0));

    for (k, (angle, _)) in pairs.iter().enumerate() {
        let expected = k as f64 * step;
        if (angle - expected).abs() > ANGLE_TOLERANCE_DEG {
            return Err(format!(
                "sample {} at {} deg is off the {} deg grid (expected {})",
                k, angle, step, expected
            ));
        }
    }
    Ok(pairs.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            angle_step_deg: 90.0,
            ..Default::default()
        }
    }

    fn request(case: SolutionCase) -> ExtractionRequest {
        ExtractionRequest {
            hole: 0,
            quantity: Quantity::Ey,
            case,
            location: SampleLocation::Boundary,
            surface: Surface::MidPlane,
            offset_in: 0.0,
            angle_step_deg: 90.0,
        }
    }

    fn series(case: SolutionCase, angles: Vec<f64>, values: Vec<f64>) -> RawSeries {
        RawSeries {
            hole: 0,
            quantity: Quantity::Ey,
            case,
            location: SampleLocation::Boundary,
            surface: Surface::MidPlane,
            angles_deg: angles,
            values,
        }
    }

    fn raw(series: Vec<RawSeries>) -> RawSamples {
        RawSamples {
            configuration: Configuration::Print,
            plate_modulus: 10.3e6,
            requests: vec![request(SolutionCase::Combined)],
            series,
        }
    }

    #[test]
    fn test_sorts_and_wraps_angles() {
        let r = raw(vec![series(
            SolutionCase::Combined,
            vec![-90.0, 360.0, 90.0, 180.0],
            vec![4.0, 1.0, 2.0, 3.0],
        )]);
        let out = extract(&r, &settings()).unwrap();
        assert_eq!(out.angles_deg, vec![0.0, 90.0, 180.0, 270.0]);
        let key = SeriesKey::new(Quantity::Ey, SolutionCase::Combined, SampleLocation::Boundary, Surface::MidPlane);
        assert_eq!(out.series(0, &key).unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out.names(0), vec!["ey-combined"]);
    }

    #[test]
    fn test_short_series() {
        let r = raw(vec![series(SolutionCase::Combined, vec![0.0, 90.0, 180.0], vec![1.0, 2.0, 3.0])]);
        assert!(matches!(
            extract(&r, &settings()),
            Err(KtError::IncompleteResult { .. })
        ));
    }

    #[test]
    fn test_missing_case() {
        let r = raw(vec![series(
            SolutionCase::BypPos,
            vec![0.0, 90.0, 180.0, 270.0],
            vec![1.0; 4],
        )]);
        let err = extract(&r, &settings()).unwrap_err();
        assert_eq!(err.error_code(), "INCOMPLETE_RESULT");
        assert!(err.to_string().contains("ey-combined"));
    }

    #[test]
    fn test_off_grid_and_duplicate_angles() {
        let off = raw(vec![series(
            SolutionCase::Combined,
            vec![0.0, 90.0, 185.0, 270.0],
            vec![1.0; 4],
        )]);
        assert!(extract(&off, &settings()).is_err());

        let dup = raw(vec![series(
            SolutionCase::Combined,
            vec![0.0, 90.0, 90.0, 270.0],
            vec![1.0; 4],
        )]);
        assert!(extract(&dup, &settings()).is_err());
    }

    #[test]
    fn test_non_finite_value() {
        let r = raw(vec![series(
            SolutionCase::Combined,
            vec![0.0, 90.0, 180.0, 270.0],
            vec![1.0, f64::NAN, 1.0, 1.0],
        )]);
        assert!(extract(&r, &settings()).is_err());
    }

    #[test]
    fn test_names() {
        let outer = SeriesKey::new(Quantity::Ey, SolutionCase::BrgNeg, SampleLocation::Offset, Surface::Outer);
        assert_eq!(outer.name(), "ey-local-brg-neg@Outer");
        let bc = SeriesKey::new(Quantity::Bc, SolutionCase::Combined, SampleLocation::Boundary, Surface::MidPlane);
        assert_eq!(bc.name(), "bc-combined");
    }

    #[test]
    fn test_superpose() {
        let angles = vec![0.0, 90.0, 180.0, 270.0];
        let r = RawSamples {
            configuration: Configuration::Print,
            plate_modulus: 10.3e6,
            requests: vec![request(SolutionCase::BypPos), request(SolutionCase::BypNeg)],
            series: vec![
                series(SolutionCase::BypPos, angles.clone(), vec![1.0, 2.0, 3.0, 4.0]),
                series(SolutionCase::BypNeg, angles, vec![-1.0, 0.0, 1.0, 0.0]),
            ],
        };
        let out = extract(&r, &settings()).unwrap();
        let sum = out
            .superpose(
                0,
                Quantity::Ey,
                SampleLocation::Boundary,
                Surface::MidPlane,
                &[SolutionCase::BypPos, SolutionCase::BypNeg],
            )
            .unwrap();
        assert_eq!(sum, vec![0.0, 2.0, 4.0, 4.0]);
    }
}
