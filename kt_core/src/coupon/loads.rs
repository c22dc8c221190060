//! Load channels and their resolution into balanced edge loads.
//!
//! A coupon carries six independent load channels. Each channel resolves to a
//! self-equilibrated set of edge resultants (bypass group) or edge reactions
//! plus a fastener load (bearing group). Resultants act at edge midpoints and
//! moments are taken about the main hole centre.
//!
//! ```text
//!              top  (Fx_top, Fy_top, M_top)
//!        +--------------------------------+
//!        |                                |
//!   lh   |            (x0, y0)            |   rh
//!        |               O  <- Px, Py     |
//!        |                                |
//!        +--------------------------------+
//!              bot
//! ```
//!
//! Every channel is assigned to exactly one partial solution case, so the
//! four partial cases sum to the combined case by construction.

use serde::{Deserialize, Serialize};

/// Plate edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Bot,
    Lh,
    Rh,
    Top,
}

impl Edge {
    /// All edges, in solver parameter order
    pub const ALL: [Edge; 4] = [Edge::Bot, Edge::Lh, Edge::Rh, Edge::Top];

    /// Short name used in parameter and constraint names
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Bot => "bot",
            Edge::Lh => "lh",
            Edge::Rh => "rh",
            Edge::Top => "top",
        }
    }

    /// The edge across the plate
    pub fn opposite(&self) -> Edge {
        match self {
            Edge::Bot => Edge::Top,
            Edge::Top => Edge::Bot,
            Edge::Lh => Edge::Rh,
            Edge::Rh => Edge::Lh,
        }
    }

    /// True for top and bottom (edges parallel to x)
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Edge::Top | Edge::Bot)
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four load-entry modes. The active one selects the corner symmetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LoadEntryMode {
    #[default]
    Bypass,
    AxialShear,
    BearingAxial,
    BearingShear,
}

/// Solution cases registered with the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SolutionCase {
    #[serde(rename = "byp-pos")]
    BypPos,
    #[serde(rename = "byp-neg")]
    BypNeg,
    #[serde(rename = "brg-pos")]
    BrgPos,
    #[serde(rename = "brg-neg")]
    BrgNeg,
    #[serde(rename = "combined")]
    Combined,
}

impl SolutionCase {
    /// All five cases, partial cases first
    pub const ALL: [SolutionCase; 5] = [
        SolutionCase::BypPos,
        SolutionCase::BypNeg,
        SolutionCase::BrgPos,
        SolutionCase::BrgNeg,
        SolutionCase::Combined,
    ];

    /// The four cases that superpose to `Combined`
    pub const PARTIAL: [SolutionCase; 4] = [
        SolutionCase::BypPos,
        SolutionCase::BypNeg,
        SolutionCase::BrgPos,
        SolutionCase::BrgNeg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SolutionCase::BypPos => "byp-pos",
            SolutionCase::BypNeg => "byp-neg",
            SolutionCase::BrgPos => "brg-pos",
            SolutionCase::BrgNeg => "brg-neg",
            SolutionCase::Combined => "combined",
        }
    }

    /// True for the two bearing cases
    pub fn is_bearing(&self) -> bool {
        matches!(self, SolutionCase::BrgPos | SolutionCase::BrgNeg)
    }
}

impl std::fmt::Display for SolutionCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Input channels
// ============================================================================

/// Far-field bypass loads (signed).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BypassLoads {
    /// Axial x force, applied +fx on rh and -fx on lh (lb)
    pub fx: f64,
    /// Axial y force, applied +fy on top and -fy on bot (lb)
    pub fy: f64,
    /// In-plane shear, +v on rh and -v on lh (lb)
    pub v: f64,
    /// Moment on top edge, reacted on bot (in-lb)
    pub m_top: f64,
    /// Moment on rh edge, reacted on lh (in-lb)
    pub m_rh: f64,
}

/// Axial-shear magnitudes per edge and direction (non-negative, lb).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AxialShearLoads {
    pub bot_neg: f64,
    pub top_neg: f64,
    pub lh_neg: f64,
    pub rh_neg: f64,
    pub bot_pos: f64,
    pub top_pos: f64,
    pub lh_pos: f64,
    pub rh_pos: f64,
}

impl AxialShearLoads {
    /// (edge, magnitude) of the negative-direction channels
    pub fn negative(&self) -> [(Edge, f64); 4] {
        [
            (Edge::Bot, self.bot_neg),
            (Edge::Top, self.top_neg),
            (Edge::Lh, self.lh_neg),
            (Edge::Rh, self.rh_neg),
        ]
    }

    /// (edge, magnitude) of the positive-direction channels
    pub fn positive(&self) -> [(Edge, f64); 4] {
        [
            (Edge::Bot, self.bot_pos),
            (Edge::Top, self.top_pos),
            (Edge::Lh, self.lh_pos),
            (Edge::Rh, self.rh_pos),
        ]
    }
}

/// Fastener bearing magnitudes along x and y (non-negative, lb).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BearingAxialLoads {
    pub px_pos: f64,
    pub px_neg: f64,
    pub py_pos: f64,
    pub py_neg: f64,
}

/// Fastener load reacted as negative shear on one edge (non-negative, lb).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BearingShearLoads {
    pub bot_neg: f64,
    pub top_neg: f64,
    pub lh_neg: f64,
    pub rh_neg: f64,
}

impl BearingShearLoads {
    pub fn channels(&self) -> [(Edge, f64); 4] {
        [
            (Edge::Bot, self.bot_neg),
            (Edge::Top, self.top_neg),
            (Edge::Lh, self.lh_neg),
            (Edge::Rh, self.rh_neg),
        ]
    }
}

/// All load channels of a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadInput {
    pub bypass: BypassLoads,
    pub axial_shear: AxialShearLoads,
    pub bearing_axial: BearingAxialLoads,
    pub bearing_shear: BearingShearLoads,
}

impl LoadInput {
    /// True when no channel carries load
    pub fn is_zero(&self) -> bool {
        *self == LoadInput::default()
    }
}

// ============================================================================
// Resolved edge loads
// ============================================================================

/// Resultant on one edge
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeLoad {
    pub fx: f64,
    pub fy: f64,
    pub m: f64,
}

/// Resultants on all four edges
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeLoads {
    pub bot: EdgeLoad,
    pub lh: EdgeLoad,
    pub rh: EdgeLoad,
    pub top: EdgeLoad,
}

impl EdgeLoads {
    pub fn get(&self, edge: Edge) -> &EdgeLoad {
        match edge {
            Edge::Bot => &self.bot,
            Edge::Lh => &self.lh,
            Edge::Rh => &self.rh,
            Edge::Top => &self.top,
        }
    }

    pub fn get_mut(&mut self, edge: Edge) -> &mut EdgeLoad {
        match edge {
            Edge::Bot => &mut self.bot,
            Edge::Lh => &mut self.lh,
            Edge::Rh => &mut self.rh,
            Edge::Top => &mut self.top,
        }
    }

    /// Elementwise sum
    pub fn plus(&self, other: &EdgeLoads) -> EdgeLoads {
        let mut out = *self;
        for edge in Edge::ALL {
            let a = out.get_mut(edge);
            let b = other.get(edge);
            a.fx += b.fx;
            a.fy += b.fy;
            a.m += b.m;
        }
        out
    }

    /// Largest absolute component difference against another set
    pub fn max_abs_diff(&self, other: &EdgeLoads) -> f64 {
        Edge::ALL
            .iter()
            .map(|&e| {
                let (a, b) = (self.get(e), other.get(e));
                (a.fx - b.fx).abs().max((a.fy - b.fy).abs()).max((a.m - b.m).abs())
            })
            .fold(0.0, f64::max)
    }
}

/// Plate frame used to take moments about the main hole centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlateFrame {
    pub width: f64,
    pub height: f64,
    pub x0: f64,
    pub y0: f64,
}

impl PlateFrame {
    /// Edge midpoint relative to the hole centre
    pub fn arm(&self, edge: Edge) -> (f64, f64) {
        match edge {
            Edge::Bot => (self.width / 2.0 - self.x0, -self.y0),
            Edge::Top => (self.width / 2.0 - self.x0, self.height - self.y0),
            Edge::Lh => (-self.x0, self.height / 2.0 - self.y0),
            Edge::Rh => (self.width - self.x0, self.height / 2.0 - self.y0),
        }
    }

    /// Moment of a set of edge loads about the hole centre
    pub fn moment(&self, loads: &EdgeLoads) -> f64 {
        Edge::ALL
            .iter()
            .map(|&e| {
                let (rx, ry) = self.arm(e);
                let l = loads.get(e);
                rx * l.fy - ry * l.fx + l.m
            })
            .sum()
    }

    /// Cancel a moment with an Fx couple on top/bot (tangential to those edges).
    fn cancel_with_fx_couple(&self, loads: &mut EdgeLoads, moment: f64) {
        // top +a, bot -a produces -h*a
        let a = moment / self.height;
        loads.top.fx += a;
        loads.bot.fx -= a;
    }

    /// Cancel a moment with an Fy couple on rh/lh.
    fn cancel_with_fy_couple(&self, loads: &mut EdgeLoads, moment: f64) {
        // rh +d, lh -d produces w*d
        let d = -moment / self.width;
        loads.rh.fy += d;
        loads.lh.fy -= d;
    }
}

/// Loads of one partial solution case.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CaseLoads {
    pub bypass: EdgeLoads,
    pub bearing: EdgeLoads,
    /// Fastener load on the hole, x
    pub px: f64,
    /// Fastener load on the hole, y
    pub py: f64,
}

impl CaseLoads {
    pub fn plus(&self, other: &CaseLoads) -> CaseLoads {
        CaseLoads {
            bypass: self.bypass.plus(&other.bypass),
            bearing: self.bearing.plus(&other.bearing),
            px: self.px + other.px,
            py: self.py + other.py,
        }
    }

    /// Every component multiplied by `k`
    pub fn scaled(&self, k: f64) -> CaseLoads {
        let mut out = *self;
        for edge in Edge::ALL {
            for set in [&mut out.bypass, &mut out.bearing] {
                let l = set.get_mut(edge);
                l.fx *= k;
                l.fy *= k;
                l.m *= k;
            }
        }
        out.px *= k;
        out.py *= k;
        out
    }

    /// Bypass and bearing edge loads summed per edge
    pub fn edge_totals(&self) -> EdgeLoads {
        self.bypass.plus(&self.bearing)
    }

    /// (ΣFx, ΣFy, ΣM) of edges plus fastener load; zero when balanced.
    pub fn residual(&self, frame: &PlateFrame) -> (f64, f64, f64) {
        let edges = self.edge_totals();
        let fx: f64 = Edge::ALL.iter().map(|&e| edges.get(e).fx).sum::<f64>() + self.px;
        let fy: f64 = Edge::ALL.iter().map(|&e| edges.get(e).fy).sum::<f64>() + self.py;
        (fx, fy, frame.moment(&edges))
    }

    /// True when the fastener carries no load
    pub fn is_open(&self) -> bool {
        self.px == 0.0 && self.py == 0.0
    }
}

/// Loads resolved per partial solution case.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolvedLoads {
    pub frame: PlateFrame,
    pub byp_pos: CaseLoads,
    pub byp_neg: CaseLoads,
    pub brg_pos: CaseLoads,
    pub brg_neg: CaseLoads,
}

impl Default for PlateFrame {
    fn default() -> Self {
        PlateFrame {
            width: 1.0,
            height: 1.0,
            x0: 0.5,
            y0: 0.5,
        }
    }
}

impl ResolvedLoads {
    /// Resolve every channel of `input` on `frame`.
    pub fn resolve(input: &LoadInput, frame: PlateFrame) -> ResolvedLoads {
        let mut out = ResolvedLoads {
            frame,
            ..Default::default()
        };
        let (w, h) = (frame.width, frame.height);

        // Bypass, signed channels
        let b = &input.bypass;
        if b.fx != 0.0 {
            let part = out.bypass_part_mut(b.fx);
            part.bypass.rh.fx += b.fx;
            part.bypass.lh.fx -= b.fx;
        }
        if b.fy != 0.0 {
            let part = out.bypass_part_mut(b.fy);
            part.bypass.top.fy += b.fy;
            part.bypass.bot.fy -= b.fy;
        }
        if b.v != 0.0 {
            let part = out.bypass_part_mut(b.v);
            part.bypass.rh.fy += b.v;
            part.bypass.lh.fy -= b.v;
            part.bypass.top.fx += b.v * w / h;
            part.bypass.bot.fx -= b.v * w / h;
        }
        if b.m_top != 0.0 {
            let part = out.bypass_part_mut(b.m_top);
            part.bypass.top.m += b.m_top;
            part.bypass.bot.m -= b.m_top;
        }
        if b.m_rh != 0.0 {
            let part = out.bypass_part_mut(b.m_rh);
            part.bypass.rh.m += b.m_rh;
            part.bypass.lh.m -= b.m_rh;
        }

        // Axial-shear: tangential pair on opposite edges plus balancing couple
        let shear = input.axial_shear;
        for (sign, channels) in [(-1.0, shear.negative()), (1.0, shear.positive())] {
            for (edge, magnitude) in channels {
                if magnitude == 0.0 {
                    continue;
                }
                let s = sign * magnitude;
                let mut loads = EdgeLoads::default();
                if edge.is_horizontal() {
                    loads.get_mut(edge).fx += s;
                    loads.get_mut(edge.opposite()).fx -= s;
                    let m = frame.moment(&loads);
                    frame.cancel_with_fy_couple(&mut loads, m);
                } else {
                    loads.get_mut(edge).fy += s;
                    loads.get_mut(edge.opposite()).fy -= s;
                    let m = frame.moment(&loads);
                    frame.cancel_with_fx_couple(&mut loads, m);
                }
                let part = out.bypass_part_mut(s);
                part.bypass = part.bypass.plus(&loads);
            }
        }

        // Bearing-axial: reaction on the edge the symmetry cut keeps,
        // offset moment cancelled on the same edge
        let ba = input.bearing_axial;
        let axial = [
            (ba.px_pos, Edge::Lh, -1.0, 0.0, true),
            (ba.px_neg, Edge::Rh, 1.0, 0.0, false),
            (ba.py_pos, Edge::Bot, 0.0, -1.0, true),
            (ba.py_neg, Edge::Top, 0.0, 1.0, false),
        ];
        for (magnitude, edge, ux, uy, positive) in axial {
            if magnitude == 0.0 {
                continue;
            }
            let mut loads = EdgeLoads::default();
            loads.get_mut(edge).fx += ux * magnitude;
            loads.get_mut(edge).fy += uy * magnitude;
            let m = frame.moment(&loads);
            loads.get_mut(edge).m -= m;
            let part = if positive { &mut out.brg_pos } else { &mut out.brg_neg };
            part.bearing = part.bearing.plus(&loads);
            part.px -= ux * magnitude;
            part.py -= uy * magnitude;
        }

        // Bearing-shear: negative tangential reaction, moment carried by a
        // couple on the perpendicular edge pair
        for (edge, magnitude) in input.bearing_shear.channels() {
            if magnitude == 0.0 {
                continue;
            }
            let mut loads = EdgeLoads::default();
            let part = &mut out.brg_neg;
            if edge.is_horizontal() {
                loads.get_mut(edge).fx -= magnitude;
                let m = frame.moment(&loads);
                frame.cancel_with_fy_couple(&mut loads, m);
                part.px += magnitude;
            } else {
                loads.get_mut(edge).fy -= magnitude;
                let m = frame.moment(&loads);
                frame.cancel_with_fx_couple(&mut loads, m);
                part.py += magnitude;
            }
            part.bearing = part.bearing.plus(&loads);
        }

        out
    }

    fn bypass_part_mut(&mut self, signed: f64) -> &mut CaseLoads {
        if signed >= 0.0 {
            &mut self.byp_pos
        } else {
            &mut self.byp_neg
        }
    }

    /// Loads of one solution case; `Combined` is the sum of the four parts.
    pub fn split(&self, case: SolutionCase) -> CaseLoads {
        match case {
            SolutionCase::BypPos => self.byp_pos,
            SolutionCase::BypNeg => self.byp_neg,
            SolutionCase::BrgPos => self.brg_pos,
            SolutionCase::BrgNeg => self.brg_neg,
            SolutionCase::Combined => self.combined(),
        }
    }

    pub fn combined(&self) -> CaseLoads {
        self.byp_pos
            .plus(&self.byp_neg)
            .plus(&self.brg_pos)
            .plus(&self.brg_neg)
    }

    /// Residual of the combined loads
    pub fn residual(&self) -> (f64, f64, f64) {
        self.combined().residual(&self.frame)
    }

    /// True when all residual components are within `tolerance`
    pub fn is_balanced(&self, tolerance: f64) -> bool {
        let (fx, fy, m) = self.residual();
        fx.abs() <= tolerance && fy.abs() <= tolerance && m.abs() <= tolerance
    }

    /// Named components (`Fx_top_byp`, ..., `Px`, `Py`) of the combined loads
    pub fn named_components(&self) -> Vec<(String, f64)> {
        let combined = self.combined();
        let mut out = Vec::with_capacity(26);
        let components: [(&str, fn(&EdgeLoad) -> f64); 3] =
            [("Fx", |l| l.fx), ("Fy", |l| l.fy), ("M", |l| l.m)];
        for (component, pick) in components {
            for edge in Edge::ALL {
                out.push((
                    format!("{}_{}_brg", component, edge),
                    pick(combined.bearing.get(edge)),
                ));
                out.push((
                    format!("{}_{}_byp", component, edge),
                    pick(combined.bypass.get(edge)),
                ));
            }
        }
        out.push(("Px".to_string(), combined.px));
        out.push(("Py".to_string(), combined.py));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_frame() -> PlateFrame {
        PlateFrame {
            width: 1.5425,
            height: 1.855,
            x0: 0.492,
            y0: 0.9275,
        }
    }

    fn reference_input() -> LoadInput {
        LoadInput {
            bypass: BypassLoads {
                fy: 9809.0,
                ..Default::default()
            },
            bearing_axial: BearingAxialLoads {
                px_neg: 104.0,
                ..Default::default()
            },
            bearing_shear: BearingShearLoads {
                rh_neg: 1289.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_coupon_balance() {
        let r = ResolvedLoads::resolve(&reference_input(), reference_frame());
        let c = r.combined();
        assert!((c.bearing.top.fx - -729.0).abs() <= 1.0);
        assert!((c.bearing.bot.fx - 729.0).abs() <= 1.0);
        assert!((c.bearing.rh.fx - 104.0).abs() <= 1.0);
        assert!((c.bearing.rh.fy - -1289.0).abs() <= 1.0);
        assert!((c.bypass.top.fy - 9809.0).abs() <= 1.0);
        assert!((c.bypass.bot.fy - -9809.0).abs() <= 1.0);
        assert!((c.px - -104.0).abs() <= 1.0);
        assert!((c.py - 1289.0).abs() <= 1.0);
        assert!(c.bearing.rh.m.abs() <= 1.0);
        assert!(r.is_balanced(1e-6));
    }

    #[test]
    fn test_every_channel_balances() {
        let frame = PlateFrame {
            width: 6.0,
            height: 3.0,
            x0: 2.2,
            y0: 1.1,
        };
        let input = LoadInput {
            bypass: BypassLoads {
                fx: 619.0,
                fy: -250.0,
                v: 75.0,
                m_top: 40.0,
                m_rh: -12.0,
            },
            axial_shear: AxialShearLoads {
                bot_neg: 760.0,
                top_pos: 30.0,
                lh_neg: 12.0,
                rh_pos: 44.0,
                ..Default::default()
            },
            bearing_axial: BearingAxialLoads {
                px_neg: 858.0,
                py_pos: 100.0,
                ..Default::default()
            },
            bearing_shear: BearingShearLoads {
                bot_neg: 10.0,
                top_neg: 20.0,
                lh_neg: 30.0,
                rh_neg: 92106.0,
            },
        };
        let r = ResolvedLoads::resolve(&input, frame);
        for case in SolutionCase::ALL {
            let (fx, fy, m) = r.split(case).residual(&frame);
            assert!(fx.abs() < 1e-6, "{case}: fx {fx}");
            assert!(fy.abs() < 1e-6, "{case}: fy {fy}");
            assert!(m.abs() < 1e-6, "{case}: m {m}");
        }
    }

    #[test]
    fn test_partials_sum_to_combined() {
        let r = ResolvedLoads::resolve(&reference_input(), reference_frame());
        let sum = SolutionCase::PARTIAL
            .iter()
            .fold(CaseLoads::default(), |acc, &c| acc.plus(&r.split(c)));
        assert_eq!(sum, r.combined());
    }

    #[test]
    fn test_case_assignment() {
        let r = ResolvedLoads::resolve(&reference_input(), reference_frame());
        // +fy is a positive bypass channel
        assert_eq!(r.byp_pos.bypass.top.fy, 9809.0);
        assert!(r.byp_neg.bypass.top.fy == 0.0);
        // px_neg and vbs land in brg-neg
        assert!(r.brg_pos.is_open());
        assert_eq!(r.brg_neg.px, -104.0);
        assert_eq!(r.brg_neg.py, 1289.0);
    }

    #[test]
    fn test_named_components() {
        let r = ResolvedLoads::resolve(&reference_input(), reference_frame());
        let named = r.named_components();
        assert_eq!(named.len(), 26);
        let lookup = |n: &str| named.iter().find(|(k, _)| k == n).map(|(_, v)| *v);
        assert_eq!(lookup("Fy_top_byp"), Some(9809.0));
        assert_eq!(lookup("Px"), Some(-104.0));
        assert_eq!(lookup("Fx_rh_brg"), Some(104.0));
    }

    #[test]
    fn test_zero_input() {
        let r = ResolvedLoads::resolve(&LoadInput::default(), reference_frame());
        assert_eq!(r.residual(), (0.0, 0.0, 0.0));
        assert!(r.combined().is_open());
    }
}
