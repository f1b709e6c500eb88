use crate::expression::kind::NodeKind;
use crate::expression::node::Node;

/// Register slot holding one op's color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot(pub(crate) u32);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Op {
    pub(crate) kind: NodeKind,
    /// Range into `Program::params`.
    pub(crate) params: (u32, u32),
    pub(crate) args: [Slot; 3],
    pub(crate) argc: u8,
}

/// Single-assignment register program: op `i` writes slot `i`, operands always precede their
/// users, and the last op holds the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) ops: Vec<Op>,
    pub(crate) params: Vec<f32>,
    pub(crate) reads_variables: bool,
}

impl Program {
    pub fn lower(root: &Node) -> Self {
        let mut program = Program {
            ops: Vec::with_capacity(root.node_count()),
            params: Vec::new(),
            reads_variables: false,
        };
        program.emit(root);
        program
    }

    fn emit(&mut self, node: &Node) -> Slot {
        let mut args = [Slot(0); 3];
        for (slot, child) in args.iter_mut().zip(node.children()) {
            *slot = self.emit(child);
        }

        let start = self.params.len() as u32;
        self.params.extend_from_slice(node.params());
        let end = self.params.len() as u32;

        self.reads_variables |= node.kind().reads_variables();
        let out = Slot(self.ops.len() as u32);
        self.ops.push(Op {
            kind: node.kind(),
            params: (start, end),
            args,
            argc: node.children().len() as u8,
        });
        out
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn reads_variables(&self) -> bool {
        self.reads_variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse_expression;

    #[test]
    fn lowers_one_op_per_node_children_first() {
        let n = parse_expression("mix(x, sin(y, 2, 0.5), rgb(0.1, 0.2, 0.3))").unwrap();
        let p = Program::lower(&n);
        assert_eq!(p.len(), n.node_count());

        let kinds: Vec<NodeKind> = p.ops.iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::X,
                NodeKind::Y,
                NodeKind::Sin,
                NodeKind::Rgb,
                NodeKind::Mix
            ]
        );
        let mix = p.ops.last().unwrap();
        assert_eq!(mix.argc, 3);
        assert_eq!(mix.args, [Slot(0), Slot(2), Slot(3)]);
        assert_eq!(p.params, vec![2.0, 0.5, 0.1, 0.2, 0.3]);
        assert!(!p.reads_variables());
    }
}
