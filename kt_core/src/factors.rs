//! # Kts Correction Factors
//!
//! Correction factors applied to the theoretical peak stress before it is
//! compared with the allowable:
//!
//! ```text
//! Fkts         = Fsg × Fg × Ft × Fsf × Fsc
//! Kts_adjusted = Kts × Fkts
//! ```
//!
//! ## Factor Summary
//!
//! | Factor | Description              | Keyed by                |
//! |--------|--------------------------|-------------------------|
//! | Fsg    | Material (alloy)         | alloy                   |
//! | Fg     | Grain direction          | `form/grain`            |
//! | Ft     | Stock thickness          | form + thickness band   |
//! | Fsf    | Surface finish           | finish                  |
//! | Fsc    | Coating / condition      | `coating/condition`     |
//!
//! The tables themselves are external data, loaded from JSON.
//!
//! ## Example
//!
//! ```rust
//! use kt_core::factors::{lookup_factors, FactorTables, MaterialSpec, ThicknessBand};
//!
//! let mut tables = FactorTables::default();
//! tables.fsg.insert("7075-T7351".into(), 1.0);
//! tables.fg.insert("Plate/L-T".into(), 0.97);
//! tables.ft.insert("Plate".into(), vec![ThicknessBand { max_thickness: 2.0, factor: 0.90 }]);
//! tables.fsf.insert("Machined".into(), 1.0);
//! tables.fsc.insert("None/Bare".into(), 1.0);
//!
//! let material = MaterialSpec {
//!     alloy: "7075-T7351".into(),
//!     form: "Plate".into(),
//!     grain: "L-T".into(),
//!     stock_thickness: 1.0,
//!     finish: "Machined".into(),
//!     coating: "None".into(),
//!     condition: "Bare".into(),
//! };
//! let factors = lookup_factors(&tables, &material).unwrap();
//! assert!((factors.fkts() - 0.873).abs() < 1e-12);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{KtError, KtResult};

/// Factor names used in `MissingFactor` errors
pub mod factor_name {
    pub const FSG: &str = "Fsg";
    pub const FG: &str = "Fg";
    pub const FT: &str = "Ft";
    pub const FSF: &str = "Fsf";
    pub const FSC: &str = "Fsc";
}

/// Material description used to key the factor tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub alloy: String,
    /// Product form, e.g. Plate, Extrusion, Forging
    pub form: String,
    /// Grain direction, e.g. L-T
    pub grain: String,
    /// Stock thickness, in
    pub stock_thickness: f64,
    pub finish: String,
    pub coating: String,
    pub condition: String,
}

impl MaterialSpec {
    pub fn grain_key(&self) -> String {
        format!("{}/{}", self.form, self.grain)
    }

    pub fn coating_key(&self) -> String {
        format!("{}/{}", self.coating, self.condition)
    }
}

/// Upper thickness bound of a band and its factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThicknessBand {
    /// Inclusive upper bound, in
    pub max_thickness: f64,
    pub factor: f64,
}

/// Correction factor lookup tables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorTables {
    pub fsg: BTreeMap<String, f64>,
    pub fg: BTreeMap<String, f64>,
    /// Bands per form, ascending by `max_thickness`
    pub ft: BTreeMap<String, Vec<ThicknessBand>>,
    pub fsf: BTreeMap<String, f64>,
    pub fsc: BTreeMap<String, f64>,
}

/// The five looked-up factors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionFactors {
    pub fsg: f64,
    pub fg: f64,
    pub ft: f64,
    pub fsf: f64,
    pub fsc: f64,
}

impl Default for CorrectionFactors {
    fn default() -> Self {
        CorrectionFactors {
            fsg: 1.0,
            fg: 1.0,
            ft: 1.0,
            fsf: 1.0,
            fsc: 1.0,
        }
    }
}

impl CorrectionFactors {
    /// Combined factor
    pub fn fkts(&self) -> f64 {
        self.fsg * self.fg * self.ft * self.fsf * self.fsc
    }

    /// Check every factor is finite and positive.
    pub fn validate(&self) -> KtResult<()> {
        for (name, value) in [
            (factor_name::FSG, self.fsg),
            (factor_name::FG, self.fg),
            (factor_name::FT, self.ft),
            (factor_name::FSF, self.fsf),
            (factor_name::FSC, self.fsc),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(KtError::invalid_input(name, value.to_string(), "Factor must be positive"));
            }
        }
        Ok(())
    }
}

fn lookup(table: &BTreeMap<String, f64>, factor: &str, key: &str) -> KtResult<f64> {
    table
        .get(key)
        .copied()
        .ok_or_else(|| KtError::missing_factor(factor, key))
}

/// Thickness factor: first band whose upper bound covers the thickness.
fn lookup_thickness(tables: &FactorTables, form: &str, thickness: f64) -> KtResult<f64> {
    let bands = tables
        .ft
        .get(form)
        .ok_or_else(|| KtError::missing_factor(factor_name::FT, form))?;
    bands
        .iter()
        .find(|band| thickness <= band.max_thickness)
        .map(|band| band.factor)
        .ok_or_else(|| KtError::missing_factor(factor_name::FT, format!("{} @ {} in", form, thickness)))
}

/// Look up all five factors for a material.
///
/// # Errors
///
/// `MissingFactor` naming the first factor and key with no table entry.
pub fn lookup_factors(tables: &FactorTables, material: &MaterialSpec) -> KtResult<CorrectionFactors> {
    let factors = CorrectionFactors {
        fsg: lookup(&tables.fsg, factor_name::FSG, &material.alloy)?,
        fg: lookup(&tables.fg, factor_name::FG, &material.grain_key())?,
        ft: lookup_thickness(tables, &material.form, material.stock_thickness)?,
        fsf: lookup(&tables.fsf, factor_name::FSF, &material.finish)?,
        fsc: lookup(&tables.fsc, factor_name::FSC, &material.coating_key())?,
    };
    factors.validate()?;
    Ok(factors)
}

/// Level at which the entered coupon loads are stated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoadLevel {
    /// Limit load: SF = 1.0
    #[default]
    Limit,
    /// Ultimate load: SF = 1.5
    Ultimate,
}

impl LoadLevel {
    /// Load safety factor of this level over limit load.
    pub fn safety_factor(self) -> f64 {
        match self {
            LoadLevel::Limit => 1.0,
            LoadLevel::Ultimate => 1.5,
        }
    }
}

impl std::fmt::Display for LoadLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadLevel::Limit => write!(f, "Limit"),
            LoadLevel::Ultimate => write!(f, "Ultimate"),
        }
    }
}

impl std::str::FromStr for LoadLevel {
    type Err = KtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "limit" => Ok(LoadLevel::Limit),
            "ultimate" => Ok(LoadLevel::Ultimate),
            _ => Err(KtError::invalid_input("load_level", s, "Expected Limit or Ultimate")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> FactorTables {
        let mut t = FactorTables::default();
        t.fsg.insert("7075-T7351".to_string(), 1.0);
        t.fg.insert("Plate/L-T".to_string(), 0.97);
        t.ft.insert(
            "Plate".to_string(),
            vec![
                ThicknessBand {
                    max_thickness: 1.0,
                    factor: 0.95,
                },
                ThicknessBand {
                    max_thickness: 3.0,
                    factor: 0.90,
                },
            ],
        );
        t.fsf.insert("Machined".to_string(), 1.0);
        t.fsc.insert("None/Bare".to_string(), 1.0);
        t
    }

    fn material() -> MaterialSpec {
        MaterialSpec {
            alloy: "7075-T7351".to_string(),
            form: "Plate".to_string(),
            grain: "L-T".to_string(),
            stock_thickness: 2.5,
            finish: "Machined".to_string(),
            coating: "None".to_string(),
            condition: "Bare".to_string(),
        }
    }

    #[test]
    fn test_reference_fkts() {
        let f = lookup_factors(&tables(), &material()).unwrap();
        assert_eq!(f.ft, 0.90);
        assert!((f.fkts() - 0.873).abs() < 1e-12);
    }

    #[test]
    fn test_thickness_bands() {
        let mut m = material();
        m.stock_thickness = 1.0;
        assert_eq!(lookup_factors(&tables(), &m).unwrap().ft, 0.95);
        m.stock_thickness = 4.0;
        let err = lookup_factors(&tables(), &m).unwrap_err();
        assert!(matches!(err, KtError::MissingFactor { ref factor, .. } if factor == "Ft"));
    }

    #[test]
    fn test_missing_key() {
        let mut m = material();
        m.grain = "S-T".to_string();
        assert_eq!(
            lookup_factors(&tables(), &m).unwrap_err(),
            KtError::missing_factor("Fg", "Plate/S-T")
        );
    }

    #[test]
    fn test_tables_from_json() {
        let json = r#"{
            "fsg": { "2024-T351": 1.0 },
            "ft": { "Sheet": [ { "max_thickness": 0.25, "factor": 1.0 } ] }
        }"#;
        let t: FactorTables = serde_json::from_str(json).unwrap();
        assert_eq!(t.fsg["2024-T351"], 1.0);
        assert!(t.fg.is_empty());
    }

    #[test]
    fn test_non_positive_factor() {
        let mut t = tables();
        t.fsf.insert("Machined".to_string(), 0.0);
        assert!(matches!(
            lookup_factors(&t, &material()),
            Err(KtError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_load_safety_factor() {
        assert_eq!(LoadLevel::default(), LoadLevel::Limit);
        assert!((LoadLevel::Limit.safety_factor() - 1.0).abs() < 1e-12);
        assert!((LoadLevel::Ultimate.safety_factor() - 1.5).abs() < 1e-12);
        assert_eq!("ultimate".parse::<LoadLevel>().unwrap(), LoadLevel::Ultimate);
        assert_eq!(LoadLevel::Ultimate.to_string(), "Ultimate");
        assert!("proof".parse::<LoadLevel>().is_err());
    }
}
