//! # Load Symmetry Classifier
//!
//! Decides which reflective symmetry the boundary-value problem admits from
//! the bearing and shear load channels, so the model can be cut along one or
//! two plate axes.
//!
//! ## Standard path
//!
//! Each axis is evaluated independently against an ordered rule table, and
//! the two candidates are concatenated (vertical first):
//!
//! | Axis       | Channels                                   | Candidate |
//! |------------|--------------------------------------------|-----------|
//! | vertical   | `py_pos`, `vbs_lh_neg`, `vbs_rh_neg`       | `bot`     |
//! | vertical   | `py_neg`                                   | `top`     |
//! | horizontal | `px_pos`, `vbs_bot_neg`, `vbs_top_neg`     | `lh`      |
//! | horizontal | `px_neg`                                   | `rh`      |
//!
//! Bypass shear, or axial shear acting in both directions, leaves no valid
//! symmetry (`rigid-body`).
//!
//! ## Corner path
//!
//! The active load-entry mode selects a fixed quadrant:
//! bypass `bot-lh`, axial-shear `top-lh`, bearing-axial `top-rh`,
//! bearing-shear `bot-rh`.
//!
//! ## Example
//!
//! ```rust
//! use kt_core::symmetry::{classify, ClassifierPath, LoadVector, SymmetryCase};
//!
//! let lv = LoadVector { py_pos: 1.0, px_pos: 1.0, ..Default::default() };
//! assert_eq!(classify(&lv, ClassifierPath::Standard).unwrap(), SymmetryCase::BotLh);
//! ```

use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::coupon::{AxialShearLoads, Coupon, Edge, LoadEntryMode};
use crate::errors::{KtError, KtResult};

/// Bearing and shear scalars seen by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadVector {
    pub px_pos: f64,
    pub px_neg: f64,
    pub py_pos: f64,
    pub py_neg: f64,
    pub vbs_bot_neg: f64,
    pub vbs_top_neg: f64,
    pub vbs_lh_neg: f64,
    pub vbs_rh_neg: f64,
    /// Bypass shear (signed)
    pub v_byp: f64,
    pub axial_shear: AxialShearLoads,
}

impl LoadVector {
    /// Project a coupon's load channels.
    pub fn from_coupon(coupon: &Coupon) -> Self {
        let l = &coupon.loads;
        LoadVector {
            px_pos: l.bearing_axial.px_pos,
            px_neg: l.bearing_axial.px_neg,
            py_pos: l.bearing_axial.py_pos,
            py_neg: l.bearing_axial.py_neg,
            vbs_bot_neg: l.bearing_shear.bot_neg,
            vbs_top_neg: l.bearing_shear.top_neg,
            vbs_lh_neg: l.bearing_shear.lh_neg,
            vbs_rh_neg: l.bearing_shear.rh_neg,
            v_byp: l.bypass.v,
            axial_shear: l.axial_shear,
        }
    }

    fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::PxPos => self.px_pos,
            Channel::PxNeg => self.px_neg,
            Channel::PyPos => self.py_pos,
            Channel::PyNeg => self.py_neg,
            Channel::VbsBotNeg => self.vbs_bot_neg,
            Channel::VbsTopNeg => self.vbs_top_neg,
            Channel::VbsLhNeg => self.vbs_lh_neg,
            Channel::VbsRhNeg => self.vbs_rh_neg,
        }
    }

    /// Named non-negative magnitudes
    fn magnitudes(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = Channel::ALL
            .iter()
            .map(|&c| (c.name().to_string(), self.value(c)))
            .collect();
        for (edge, v) in self.axial_shear.negative() {
            out.push((format!("v_{}_neg", edge), v));
        }
        for (edge, v) in self.axial_shear.positive() {
            out.push((format!("v_{}_pos", edge), v));
        }
        out
    }

    /// True when bypass shear or two-directional axial shear is present
    pub fn is_rigid_body(&self) -> bool {
        let any_neg = self.axial_shear.negative().iter().any(|(_, v)| *v != 0.0);
        let any_pos = self.axial_shear.positive().iter().any(|(_, v)| *v != 0.0);
        self.v_byp != 0.0 || (any_neg && any_pos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    PxPos,
    PxNeg,
    PyPos,
    PyNeg,
    VbsBotNeg,
    VbsTopNeg,
    VbsLhNeg,
    VbsRhNeg,
}

impl Channel {
    const ALL: [Channel; 8] = [
        Channel::PxPos,
        Channel::PxNeg,
        Channel::PyPos,
        Channel::PyNeg,
        Channel::VbsBotNeg,
        Channel::VbsTopNeg,
        Channel::VbsLhNeg,
        Channel::VbsRhNeg,
    ];

    fn name(&self) -> &'static str {
        match self {
            Channel::PxPos => "px_pos",
            Channel::PxNeg => "px_neg",
            Channel::PyPos => "py_pos",
            Channel::PyNeg => "py_neg",
            Channel::VbsBotNeg => "vbs_bot_neg",
            Channel::VbsTopNeg => "vbs_top_neg",
            Channel::VbsLhNeg => "vbs_lh_neg",
            Channel::VbsRhNeg => "vbs_rh_neg",
        }
    }
}

/// One row of an axis rule table: any listed channel nonzero selects `cut`.
struct AxisRule {
    channels: &'static [Channel],
    cut: Edge,
}

const VERTICAL_RULES: [AxisRule; 2] = [
    AxisRule {
        channels: &[Channel::PyPos, Channel::VbsLhNeg, Channel::VbsRhNeg],
        cut: Edge::Bot,
    },
    AxisRule {
        channels: &[Channel::PyNeg],
        cut: Edge::Top,
    },
];

const HORIZONTAL_RULES: [AxisRule; 2] = [
    AxisRule {
        channels: &[Channel::PxPos, Channel::VbsBotNeg, Channel::VbsTopNeg],
        cut: Edge::Lh,
    },
    AxisRule {
        channels: &[Channel::PxNeg],
        cut: Edge::Rh,
    },
];

/// Outcome of one axis
enum AxisCut {
    Free,
    Cut(Edge),
    /// Channels select both edges of the axis
    Conflict,
}

fn evaluate_axis(lv: &LoadVector, rules: &[AxisRule]) -> AxisCut {
    let mut hits = rules
        .iter()
        .filter(|rule| rule.channels.iter().any(|&c| lv.value(c) != 0.0))
        .map(|rule| rule.cut);
    match (hits.next(), hits.next()) {
        (None, _) => AxisCut::Free,
        (Some(edge), None) => AxisCut::Cut(edge),
        (Some(_), Some(_)) => AxisCut::Conflict,
    }
}

/// Reflective symmetry admitted by a load pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymmetryCase {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "top")]
    Top,
    #[serde(rename = "bot")]
    Bot,
    #[serde(rename = "lh")]
    Lh,
    #[serde(rename = "rh")]
    Rh,
    #[serde(rename = "top-lh")]
    TopLh,
    #[serde(rename = "top-rh")]
    TopRh,
    #[serde(rename = "bot-lh")]
    BotLh,
    #[serde(rename = "bot-rh")]
    BotRh,
    /// No reflective symmetry is valid
    #[serde(rename = "rigid-body")]
    RigidBody,
}

impl SymmetryCase {
    pub const ALL: [SymmetryCase; 10] = [
        SymmetryCase::None,
        SymmetryCase::Top,
        SymmetryCase::Bot,
        SymmetryCase::Lh,
        SymmetryCase::Rh,
        SymmetryCase::TopLh,
        SymmetryCase::TopRh,
        SymmetryCase::BotLh,
        SymmetryCase::BotRh,
        SymmetryCase::RigidBody,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymmetryCase::None => "none",
            SymmetryCase::Top => "top",
            SymmetryCase::Bot => "bot",
            SymmetryCase::Lh => "lh",
            SymmetryCase::Rh => "rh",
            SymmetryCase::TopLh => "top-lh",
            SymmetryCase::TopRh => "top-rh",
            SymmetryCase::BotLh => "bot-lh",
            SymmetryCase::BotRh => "bot-rh",
            SymmetryCase::RigidBody => "rigid-body",
        }
    }

    /// Cut edges carrying a symmetry constraint, vertical axis first.
    pub fn constrained_edges(&self) -> Vec<Edge> {
        match self {
            SymmetryCase::None | SymmetryCase::RigidBody => vec![],
            SymmetryCase::Top => vec![Edge::Top],
            SymmetryCase::Bot => vec![Edge::Bot],
            SymmetryCase::Lh => vec![Edge::Lh],
            SymmetryCase::Rh => vec![Edge::Rh],
            SymmetryCase::TopLh => vec![Edge::Top, Edge::Lh],
            SymmetryCase::TopRh => vec![Edge::Top, Edge::Rh],
            SymmetryCase::BotLh => vec![Edge::Bot, Edge::Lh],
            SymmetryCase::BotRh => vec![Edge::Bot, Edge::Rh],
        }
    }

    /// True when no symmetry cut is applied
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, SymmetryCase::None | SymmetryCase::RigidBody)
    }

    fn from_cuts(vertical: Option<Edge>, horizontal: Option<Edge>) -> SymmetryCase {
        match (vertical, horizontal) {
            (None, None) => SymmetryCase::None,
            (Some(Edge::Top), None) => SymmetryCase::Top,
            (Some(_), None) => SymmetryCase::Bot,
            (None, Some(Edge::Lh)) => SymmetryCase::Lh,
            (None, Some(_)) => SymmetryCase::Rh,
            (Some(Edge::Top), Some(Edge::Lh)) => SymmetryCase::TopLh,
            (Some(Edge::Top), Some(_)) => SymmetryCase::TopRh,
            (Some(_), Some(Edge::Lh)) => SymmetryCase::BotLh,
            (Some(_), Some(_)) => SymmetryCase::BotRh,
        }
    }
}

impl std::fmt::Display for SymmetryCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SymmetryCase {
    type Err = KtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymmetryCase::ALL
            .iter()
            .copied()
            .find(|case| case.as_str() == s)
            .ok_or_else(|| KtError::invalid_input("symmetry_case", s, "Unknown symmetry case"))
    }
}

/// Which rule set decides the symmetry case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierPath {
    Standard,
    /// 45 deg reduced model keyed by the active load-entry mode
    Corner(LoadEntryMode),
}

impl ClassifierPath {
    pub fn from_flags(corner_mode: bool, active_mode: LoadEntryMode) -> Self {
        if corner_mode {
            ClassifierPath::Corner(active_mode)
        } else {
            ClassifierPath::Standard
        }
    }
}

/// Classify a load vector.
///
/// # Errors
///
/// `Configuration` when a magnitude is negative, or when one bearing axis is
/// loaded in both directions (`px_pos` with `px_neg`, `py_pos` with `py_neg`).
pub fn classify(lv: &LoadVector, path: ClassifierPath) -> KtResult<SymmetryCase> {
    for (name, value) in lv.magnitudes() {
        if !value.is_finite() || value < 0.0 {
            return Err(KtError::configuration(format!(
                "{} = {} must be a non-negative magnitude",
                name, value
            )));
        }
    }
    if lv.px_pos != 0.0 && lv.px_neg != 0.0 {
        return Err(KtError::configuration("px_pos and px_neg are both nonzero"));
    }
    if lv.py_pos != 0.0 && lv.py_neg != 0.0 {
        return Err(KtError::configuration("py_pos and py_neg are both nonzero"));
    }

    let case = match path {
        ClassifierPath::Corner(mode) => match mode {
            LoadEntryMode::Bypass => SymmetryCase::BotLh,
            LoadEntryMode::AxialShear => SymmetryCase::TopLh,
            LoadEntryMode::BearingAxial => SymmetryCase::TopRh,
            LoadEntryMode::BearingShear => SymmetryCase::BotRh,
        },
        ClassifierPath::Standard if lv.is_rigid_body() => SymmetryCase::RigidBody,
        ClassifierPath::Standard => {
            let vertical = evaluate_axis(lv, &VERTICAL_RULES);
            let horizontal = evaluate_axis(lv, &HORIZONTAL_RULES);
            match (vertical, horizontal) {
                (AxisCut::Conflict, _) | (_, AxisCut::Conflict) => SymmetryCase::RigidBody,
                (v, h) => SymmetryCase::from_cuts(cut_edge(v), cut_edge(h)),
            }
        }
    };
    debug!("classified {:?} -> {}", path, case);
    Ok(case)
}

fn cut_edge(axis: AxisCut) -> Option<Edge> {
    match axis {
        AxisCut::Cut(edge) => Some(edge),
        _ => None,
    }
}

/// Classify with the corner flag and active mode as separate inputs.
pub fn classify_with(lv: &LoadVector, corner_mode: bool, active_mode: LoadEntryMode) -> KtResult<SymmetryCase> {
    classify(lv, ClassifierPath::from_flags(corner_mode, active_mode))
}

/// Classify a coupon using its own corner flag and entry mode.
pub fn classify_coupon(coupon: &Coupon) -> KtResult<SymmetryCase> {
    classify_with(&LoadVector::from_coupon(coupon), coupon.corner_mode, coupon.active_entry_mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard(lv: LoadVector) -> SymmetryCase {
        classify(&lv, ClassifierPath::Standard).unwrap()
    }

    #[test]
    fn test_single_axis_cases() {
        let d = LoadVector::default();
        assert_eq!(standard(LoadVector { py_pos: 1.0, ..d }), SymmetryCase::Bot);
        assert_eq!(standard(LoadVector { vbs_lh_neg: 1.0, ..d }), SymmetryCase::Bot);
        assert_eq!(standard(LoadVector { vbs_rh_neg: 1.0, ..d }), SymmetryCase::Bot);
        assert_eq!(standard(LoadVector { py_neg: 1.0, ..d }), SymmetryCase::Top);
        assert_eq!(standard(LoadVector { px_pos: 1.0, ..d }), SymmetryCase::Lh);
        assert_eq!(standard(LoadVector { vbs_bot_neg: 1.0, ..d }), SymmetryCase::Lh);
        assert_eq!(standard(LoadVector { vbs_top_neg: 1.0, ..d }), SymmetryCase::Lh);
        assert_eq!(standard(LoadVector { px_neg: 1.0, ..d }), SymmetryCase::Rh);
    }

    #[test]
    fn test_compound_cases() {
        let d = LoadVector::default();
        let bot_lh = [
            LoadVector { py_pos: 1.0, px_pos: 1.0, ..d },
            LoadVector { py_pos: 1.0, vbs_bot_neg: 1.0, ..d },
            LoadVector { py_pos: 1.0, vbs_top_neg: 1.0, ..d },
            LoadVector { vbs_lh_neg: 1.0, px_pos: 1.0, ..d },
            LoadVector { vbs_lh_neg: 1.0, vbs_bot_neg: 1.0, ..d },
            LoadVector { vbs_lh_neg: 1.0, vbs_top_neg: 1.0, ..d },
            LoadVector { vbs_rh_neg: 1.0, px_pos: 1.0, ..d },
            LoadVector { vbs_rh_neg: 1.0, vbs_bot_neg: 1.0, ..d },
            LoadVector { vbs_rh_neg: 1.0, vbs_top_neg: 1.0, ..d },
        ];
        for lv in bot_lh {
            assert_eq!(standard(lv), SymmetryCase::BotLh, "{:?}", lv);
        }

        assert_eq!(standard(LoadVector { py_pos: 1.0, px_neg: 1.0, ..d }), SymmetryCase::BotRh);
        assert_eq!(standard(LoadVector { vbs_lh_neg: 1.0, px_neg: 1.0, ..d }), SymmetryCase::BotRh);
        assert_eq!(standard(LoadVector { vbs_rh_neg: 1.0, px_neg: 1.0, ..d }), SymmetryCase::BotRh);
        assert_eq!(standard(LoadVector { py_neg: 1.0, px_pos: 1.0, ..d }), SymmetryCase::TopLh);
        assert_eq!(standard(LoadVector { py_neg: 1.0, vbs_bot_neg: 1.0, ..d }), SymmetryCase::TopLh);
        assert_eq!(standard(LoadVector { py_neg: 1.0, vbs_top_neg: 1.0, ..d }), SymmetryCase::TopLh);
        assert_eq!(standard(LoadVector { py_neg: 1.0, px_neg: 1.0, ..d }), SymmetryCase::TopRh);
    }

    #[test]
    fn test_no_trigger_is_none() {
        assert_eq!(standard(LoadVector::default()), SymmetryCase::None);
        // one-directional axial shear does not cut the model
        let lv = LoadVector {
            axial_shear: AxialShearLoads {
                bot_neg: 760.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(standard(lv), SymmetryCase::None);
    }

    #[test]
    fn test_rigid_body() {
        let lv = LoadVector {
            v_byp: 1.0,
            py_pos: 1.0,
            ..Default::default()
        };
        assert_eq!(standard(lv), SymmetryCase::RigidBody);

        let lv = LoadVector {
            axial_shear: AxialShearLoads {
                bot_neg: 1.0,
                rh_pos: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(standard(lv), SymmetryCase::RigidBody);

        // shear reaction on lh with a downward bearing load selects both
        // vertical edges
        let lv = LoadVector {
            vbs_lh_neg: 1.0,
            py_neg: 1.0,
            ..Default::default()
        };
        assert_eq!(standard(lv), SymmetryCase::RigidBody);
    }

    #[test]
    fn test_corner_path_ignores_loads() {
        let lv = LoadVector {
            py_neg: 1.0,
            px_neg: 1.0,
            ..Default::default()
        };
        let expected = [
            (LoadEntryMode::Bypass, SymmetryCase::BotLh),
            (LoadEntryMode::AxialShear, SymmetryCase::TopLh),
            (LoadEntryMode::BearingAxial, SymmetryCase::TopRh),
            (LoadEntryMode::BearingShear, SymmetryCase::BotRh),
        ];
        for (mode, case) in expected {
            assert_eq!(classify_with(&lv, true, mode).unwrap(), case);
        }
        assert_eq!(classify_with(&lv, false, LoadEntryMode::Bypass).unwrap(), SymmetryCase::TopRh);
    }

    #[test]
    fn test_ambiguous_channels() {
        let lv = LoadVector {
            px_pos: 1.0,
            px_neg: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            classify(&lv, ClassifierPath::Standard),
            Err(KtError::Configuration { .. })
        ));

        let lv = LoadVector {
            py_pos: -1.0,
            ..Default::default()
        };
        assert!(classify(&lv, ClassifierPath::Standard).is_err());
    }

    #[test]
    fn test_names_roundtrip() {
        for case in SymmetryCase::ALL {
            assert_eq!(case.as_str().parse::<SymmetryCase>().unwrap(), case);
            let json = serde_json::to_string(&case).unwrap();
            assert_eq!(json, format!("\"{}\"", case.as_str()));
        }
        assert!("diagonal".parse::<SymmetryCase>().is_err());
    }

    #[test]
    fn test_constrained_edges() {
        assert_eq!(SymmetryCase::BotLh.constrained_edges(), vec![Edge::Bot, Edge::Lh]);
        assert!(SymmetryCase::RigidBody.constrained_edges().is_empty());
        assert!(SymmetryCase::None.is_unconstrained());
    }
}
