use std::f32::consts::PI;

use crate::foundation::core::Variable;

/// A literal parameter slot of a node kind, with the range random draws come from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub lo: f32,
    pub hi: f32,
}

const fn param(name: &'static str, lo: f32, hi: f32) -> ParamSpec {
    ParamSpec { name, lo, hi }
}

const NO_PARAMS: &[ParamSpec] = &[];
const SCALAR: &[ParamSpec] = &[param("value", -1.0, 1.0)];
const COLOR: &[ParamSpec] = &[
    param("r", -1.0, 1.0),
    param("g", -1.0, 1.0),
    param("b", -1.0, 1.0),
];
const WAVE: &[ParamSpec] = &[param("frequency", 1.0, 6.0), param("phase", 0.0, PI)];
const THRESHOLD: &[ParamSpec] = &[param("threshold", -1.0, 1.0)];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    X,
    Y,
    T,
    Bw,
    Rgb,
    Var(Variable),
    Sin,
    Cos,
    Tan,
    Exp,
    Sqrt,
    Sum,
    Mult,
    Mod,
    Mix,
    Level,
    Triple,
}

impl NodeKind {
    const FIXED: [NodeKind; 16] = [
        NodeKind::X,
        NodeKind::Y,
        NodeKind::T,
        NodeKind::Bw,
        NodeKind::Rgb,
        NodeKind::Sin,
        NodeKind::Cos,
        NodeKind::Tan,
        NodeKind::Exp,
        NodeKind::Sqrt,
        NodeKind::Sum,
        NodeKind::Mult,
        NodeKind::Mod,
        NodeKind::Mix,
        NodeKind::Level,
        NodeKind::Triple,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::X => "x",
            NodeKind::Y => "y",
            NodeKind::T => "t",
            NodeKind::Bw => "bw",
            NodeKind::Rgb => "rgb",
            NodeKind::Var(v) => v.name(),
            NodeKind::Sin => "sin",
            NodeKind::Cos => "cos",
            NodeKind::Tan => "tan",
            NodeKind::Exp => "exp",
            NodeKind::Sqrt => "sqrt",
            NodeKind::Sum => "sum",
            NodeKind::Mult => "mult",
            NodeKind::Mod => "mod",
            NodeKind::Mix => "mix",
            NodeKind::Level => "level",
            NodeKind::Triple => "triple",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::FIXED
            .into_iter()
            .find(|k| k.name() == name)
            .or_else(|| Variable::from_name(name).map(NodeKind::Var))
    }

    /// Number of child expressions.
    pub fn arity(self) -> usize {
        match self {
            NodeKind::X
            | NodeKind::Y
            | NodeKind::T
            | NodeKind::Bw
            | NodeKind::Rgb
            | NodeKind::Var(_) => 0,
            NodeKind::Sin | NodeKind::Cos | NodeKind::Tan | NodeKind::Exp | NodeKind::Sqrt => 1,
            NodeKind::Sum | NodeKind::Mult | NodeKind::Mod => 2,
            NodeKind::Mix | NodeKind::Level | NodeKind::Triple => 3,
        }
    }

    /// Literal parameters, in canonical order.
    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            NodeKind::Bw => SCALAR,
            NodeKind::Rgb => COLOR,
            NodeKind::Sin | NodeKind::Cos | NodeKind::Tan => WAVE,
            NodeKind::Level => THRESHOLD,
            _ => NO_PARAMS,
        }
    }

    pub fn reads_variables(self) -> bool {
        matches!(self, NodeKind::Var(_))
    }
}
