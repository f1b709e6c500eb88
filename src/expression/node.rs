use std::f32::consts::E;
use std::fmt;

use crate::expression::kind::NodeKind;
use crate::foundation::core::{Rgb, Variables};

/// Deepest tree the parser accepts and synthesis can build. Every tree walk recurses, so this
/// bounds stack use on worker threads.
pub const MAX_TREE_DEPTH: usize = 256;

/// Identifier of a node within one tree, allocated in derivation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

/// Hands out increasing [`NodeId`]s. One allocator per derivation or parse.
#[derive(Clone, Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next
    }
}

/// An immutable expression node owning its children.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    children: Vec<Node>,
    params: Vec<f32>,
}

impl Node {
    /// # Panics
    ///
    /// Panics when `children` or `params` do not match the kind's declared shape. Grammar
    /// compilation and the canonical parser check shapes before any node is built.
    pub fn new(id: NodeId, kind: NodeKind, children: Vec<Node>, params: Vec<f32>) -> Self {
        assert_eq!(
            children.len(),
            kind.arity(),
            "{} takes {} children",
            kind.name(),
            kind.arity()
        );
        assert_eq!(
            params.len(),
            kind.params().len(),
            "{} takes {} parameters",
            kind.name(),
            kind.params().len()
        );
        Self {
            id,
            kind,
            children,
            params,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Evaluate with every named variable at zero.
    pub fn eval(&self, x: f32, y: f32, t: f32) -> Rgb {
        self.eval_with(x, y, t, &Variables::NONE)
    }

    pub fn eval_with(&self, x: f32, y: f32, t: f32, vars: &Variables) -> Rgb {
        let mut args = [[0.0f32; 3]; 3];
        for (slot, child) in args.iter_mut().zip(&self.children) {
            *slot = child.eval_with(x, y, t, vars);
        }
        combine(
            self.kind,
            &self.params,
            &args[..self.children.len()],
            [x, y, t],
            vars,
        )
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Node::depth).max().unwrap_or(0)
    }

    pub fn reads_variables(&self) -> bool {
        self.kind.reads_variables() || self.children.iter().any(Node::reads_variables)
    }

    /// Visit every node children-first.
    pub fn walk_post_order<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        for c in &self.children {
            c.walk_post_order(f);
        }
        f(self);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.name())?;
        if self.children.is_empty() && self.params.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        let mut first = true;
        for child in &self.children {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{child}")?;
        }
        for p in &self.params {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{p}")?;
        }
        f.write_str(")")
    }
}

pub(crate) const EXP_MIN: f32 = 1.0 / E;
pub(crate) const EXP_MAX: f32 = E;

/// Per-kind math shared by the tree interpreter and the register VM.
///
/// `args` holds the already evaluated children; `point` is `(x, y, t)`.
pub(crate) fn combine(
    kind: NodeKind,
    params: &[f32],
    args: &[Rgb],
    point: [f32; 3],
    vars: &Variables,
) -> Rgb {
    let out = match kind {
        NodeKind::X => splat(point[0]),
        NodeKind::Y => splat(point[1]),
        NodeKind::T => splat(point[2]),
        NodeKind::Var(v) => splat(vars.get(v)),
        NodeKind::Bw => splat(params[0]),
        NodeKind::Rgb => [params[0], params[1], params[2]],
        NodeKind::Sin => map1(args[0], |a| (a * params[0] + params[1]).sin()),
        NodeKind::Cos => map1(args[0], |a| (a * params[0] + params[1]).cos()),
        NodeKind::Tan => map1(args[0], |a| (a * params[0] + params[1]).tan()),
        NodeKind::Exp => map1(args[0], |a| renorm(a.exp(), EXP_MIN, EXP_MAX)),
        NodeKind::Sqrt => map1(args[0], |a| ((a + 1.0) * 0.5).max(0.0).sqrt() * 2.0 - 1.0),
        NodeKind::Sum => map2(args[0], args[1], |a, b| (a + b) * 0.5),
        NodeKind::Mult => map2(args[0], args[1], |a, b| a * b),
        NodeKind::Mod => map2(args[0], args[1], |a, b| if b == 0.0 { a } else { a % b }),
        NodeKind::Mix => map3(args[0], args[1], args[2], |a, b, c| {
            let w = (a + 1.0) * 0.5;
            (1.0 - w) * b + w * c
        }),
        NodeKind::Level => map3(args[0], args[1], args[2], |a, b, c| {
            if a < params[0] { b } else { c }
        }),
        NodeKind::Triple => [args[0][0], args[1][1], args[2][2]],
    };
    out.map(clamp_unit)
}

fn renorm(v: f32, min: f32, max: f32) -> f32 {
    2.0 * (v - min) / (max - min) - 1.0
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) }
}

fn splat(v: f32) -> Rgb {
    [v, v, v]
}

fn map1(a: Rgb, f: impl Fn(f32) -> f32) -> Rgb {
    [f(a[0]), f(a[1]), f(a[2])]
}

fn map2(a: Rgb, b: Rgb, f: impl Fn(f32, f32) -> f32) -> Rgb {
    [f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2])]
}

fn map3(a: Rgb, b: Rgb, c: Rgb, f: impl Fn(f32, f32, f32) -> f32) -> Rgb {
    [f(a[0], b[0], c[0]), f(a[1], b[1], c[1]), f(a[2], b[2], c[2])]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Variable;

    struct Builder(IdAllocator);

    impl Builder {
        fn new() -> Self {
            Self(IdAllocator::new())
        }

        fn leaf(&mut self, kind: NodeKind, params: Vec<f32>) -> Node {
            Node::new(self.0.alloc(), kind, vec![], params)
        }

        fn node(&mut self, kind: NodeKind, children: Vec<Node>, params: Vec<f32>) -> Node {
            Node::new(self.0.alloc(), kind, children, params)
        }
    }

    #[test]
    fn coordinates_broadcast_across_channels() {
        let mut b = Builder::new();
        let x = b.leaf(NodeKind::X, vec![]);
        assert_eq!(x.eval(0.5, -0.25, 0.0), [0.5, 0.5, 0.5]);
        let t = b.leaf(NodeKind::T, vec![]);
        assert_eq!(t.eval(0.0, 0.0, 2.0), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn mod_by_zero_returns_the_dividend() {
        let mut b = Builder::new();
        let x = b.leaf(NodeKind::X, vec![]);
        let zero = b.leaf(NodeKind::Bw, vec![0.0]);
        let m = b.node(NodeKind::Mod, vec![x, zero], vec![]);
        assert_eq!(m.eval(0.75, 0.0, 0.0), [0.75, 0.75, 0.75]);
        assert_eq!(m.eval(-0.3, 0.0, 0.0), [-0.3, -0.3, -0.3]);
    }

    #[test]
    fn mod_is_a_truncated_remainder() {
        let mut b = Builder::new();
        let x = b.leaf(NodeKind::X, vec![]);
        let d = b.leaf(NodeKind::Bw, vec![0.5]);
        let m = b.node(NodeKind::Mod, vec![x, d], vec![]);
        let out = m.eval(-0.75, 0.0, 0.0);
        assert!((out[0] + 0.25).abs() < 1e-6);
    }

    #[test]
    fn level_uses_a_strict_less_than() {
        let mut b = Builder::new();
        let x = b.leaf(NodeKind::X, vec![]);
        let lo = b.leaf(NodeKind::Bw, vec![-1.0]);
        let hi = b.leaf(NodeKind::Bw, vec![1.0]);
        let level = b.node(NodeKind::Level, vec![x, lo, hi], vec![0.25]);
        assert_eq!(level.eval(0.0, 0.0, 0.0), [-1.0; 3]);
        assert_eq!(level.eval(0.25, 0.0, 0.0), [1.0; 3]);
    }

    #[test]
    fn mix_interpolates_with_the_first_child_as_weight() {
        let mut b = Builder::new();
        let x = b.leaf(NodeKind::X, vec![]);
        let lo = b.leaf(NodeKind::Bw, vec![-1.0]);
        let hi = b.leaf(NodeKind::Bw, vec![1.0]);
        let mix = b.node(NodeKind::Mix, vec![x, lo, hi], vec![]);
        assert_eq!(mix.eval(-1.0, 0.0, 0.0), [-1.0; 3]);
        assert_eq!(mix.eval(1.0, 0.0, 0.0), [1.0; 3]);
        assert_eq!(mix.eval(0.0, 0.0, 0.0), [0.0; 3]);
    }

    #[test]
    fn triple_takes_one_channel_from_each_child() {
        let mut b = Builder::new();
        let r = b.leaf(NodeKind::Rgb, vec![0.1, 0.2, 0.3]);
        let g = b.leaf(NodeKind::Rgb, vec![0.4, 0.5, 0.6]);
        let bl = b.leaf(NodeKind::Rgb, vec![0.7, 0.8, 0.9]);
        let tri = b.node(NodeKind::Triple, vec![r, g, bl], vec![]);
        assert_eq!(tri.eval(0.0, 0.0, 0.0), [0.1, 0.5, 0.9]);
    }

    #[test]
    fn unary_transforms_stay_in_range_at_the_extremes() {
        for kind in [NodeKind::Exp, NodeKind::Sqrt] {
            let mut b = Builder::new();
            let x = b.leaf(NodeKind::X, vec![]);
            let n = b.node(kind, vec![x], vec![]);
            let lo = n.eval(-1.0, 0.0, 0.0)[0];
            let hi = n.eval(1.0, 0.0, 0.0)[0];
            assert!((lo + 1.0).abs() < 1e-5, "{kind:?} lo {lo}");
            assert!((hi - 1.0).abs() < 1e-5, "{kind:?} hi {hi}");
        }

        let mut b = Builder::new();
        let x = b.leaf(NodeKind::X, vec![]);
        // pi/2 phase puts the asymptote at x = 0.
        let tan = b.node(NodeKind::Tan, vec![x], vec![1.0, std::f32::consts::FRAC_PI_2]);
        let v = tan.eval(0.0, 0.0, 0.0);
        assert!(v.iter().all(|c| (-1.0..=1.0).contains(c)));
    }

    #[test]
    fn variables_default_to_zero() {
        let mut b = Builder::new();
        let bass = b.leaf(NodeKind::Var(Variable::Bass), vec![]);
        assert_eq!(bass.eval(0.3, 0.3, 0.0), [0.0; 3]);

        let mut vars = Variables::NONE;
        vars.set(Variable::Bass, 0.6);
        assert_eq!(bass.eval_with(0.3, 0.3, 0.0, &vars), [0.6; 3]);
        assert!(bass.reads_variables());
    }

    #[test]
    fn canonical_form_lists_children_then_params() {
        let mut b = Builder::new();
        let x = b.leaf(NodeKind::X, vec![]);
        let sin = b.node(NodeKind::Sin, vec![x], vec![2.0, 0.5]);
        let y = b.leaf(NodeKind::Y, vec![]);
        let c = b.leaf(NodeKind::Rgb, vec![-0.25, 0.0, 1.0]);
        let mix = b.node(NodeKind::Mix, vec![sin, y, c], vec![]);
        assert_eq!(
            mix.to_string(),
            "mix(sin(x, 2, 0.5), y, rgb(-0.25, 0, 1))"
        );
        assert_eq!(mix.node_count(), 5);
        assert_eq!(mix.depth(), 3);
    }

    #[test]
    #[should_panic(expected = "sum takes 2 children")]
    fn wrong_child_count_is_fatal() {
        let mut b = Builder::new();
        let x = b.leaf(NodeKind::X, vec![]);
        let _ = b.node(NodeKind::Sum, vec![x], vec![]);
    }
}
