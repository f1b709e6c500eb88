use std::fmt::Write as _;

use crate::expression::kind::NodeKind;
use crate::expression::node::{EXP_MAX, EXP_MIN, Node};

/// Name of the WGSL function parameter holding `(x, y, t)`.
pub(crate) const POINT: &str = "p";
/// Name of the WGSL uniform holding the variable array.
pub(crate) const PARAMS: &str = "params";

impl Node {
    /// Append WGSL `let` statements for this subtree to `out` and return the name of the value
    /// holding this node's color.
    ///
    /// Statements are emitted children-first, one per node, named `n<id>`.
    pub fn to_code(&self, out: &mut String) -> String {
        let args: Vec<String> = self.children().iter().map(|c| c.to_code(out)).collect();
        let name = format!("n{}", self.id().0);
        let expr = wgsl_expr(self.kind(), self.params(), &args);
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "    let {name}: vec3<f32> = clamp({expr}, vec3<f32>(-1.0), vec3<f32>(1.0));"
        );
        name
    }
}

fn wgsl_expr(kind: NodeKind, params: &[f32], args: &[String]) -> String {
    let f = |i: usize| wgsl_float(params[i]);
    match kind {
        NodeKind::X => format!("vec3<f32>({POINT}.x)"),
        NodeKind::Y => format!("vec3<f32>({POINT}.y)"),
        NodeKind::T => format!("vec3<f32>({POINT}.z)"),
        NodeKind::Var(v) => {
            let i = v.index();
            format!("vec3<f32>({PARAMS}.vars[{}][{}])", i / 4, i % 4)
        }
        NodeKind::Bw => format!("vec3<f32>({})", f(0)),
        NodeKind::Rgb => format!("vec3<f32>({}, {}, {})", f(0), f(1), f(2)),
        NodeKind::Sin => format!("sin({} * {} + {})", args[0], f(0), f(1)),
        NodeKind::Cos => format!("cos({} * {} + {})", args[0], f(0), f(1)),
        NodeKind::Tan => format!("tan({} * {} + {})", args[0], f(0), f(1)),
        NodeKind::Exp => format!(
            "2.0 * (exp({}) - {}) / ({} - {}) - 1.0",
            args[0],
            wgsl_float(EXP_MIN),
            wgsl_float(EXP_MAX),
            wgsl_float(EXP_MIN)
        ),
        NodeKind::Sqrt => format!(
            "sqrt(max(({} + 1.0) * 0.5, vec3<f32>(0.0))) * 2.0 - 1.0",
            args[0]
        ),
        NodeKind::Sum => format!("({} + {}) * 0.5", args[0], args[1]),
        NodeKind::Mult => format!("{} * {}", args[0], args[1]),
        // The divisor is swapped for 1 before `%` so constant folding never sees `% 0`.
        NodeKind::Mod => format!(
            "select({a} % select({b}, vec3<f32>(1.0), {b} == vec3<f32>(0.0)), {a}, {b} == vec3<f32>(0.0))",
            a = args[0],
            b = args[1]
        ),
        NodeKind::Mix => format!(
            "mix({}, {}, ({} + 1.0) * 0.5)",
            args[1], args[2], args[0]
        ),
        NodeKind::Level => format!(
            "select({}, {}, {} < vec3<f32>({}))",
            args[2],
            args[1],
            args[0],
            f(0)
        ),
        NodeKind::Triple => format!("vec3<f32>({}.x, {}.y, {}.z)", args[0], args[1], args[2]),
    }
}

/// Format a float so WGSL reads it as an `f32` literal.
pub(crate) fn wgsl_float(v: f32) -> String {
    let mut s = format!("{v:?}");
    if !s.contains(['.', 'e', 'E']) {
        s.push_str(".0");
    }
    if v.is_sign_negative() { format!("({s})") } else { s }
}
