//! Random derivation of expression trees from a compiled [`Grammar`].

use crate::expression::node::{IdAllocator, MAX_TREE_DEPTH, Node};
use crate::foundation::rng::RandomSource;
use crate::grammar::{Grammar, Production, TERMINAL_SYMBOL, Target};

/// Largest `max_depth` [`derive`] accepts. A derived tree is at most one level deeper.
pub const MAX_DEPTH: u32 = MAX_TREE_DEPTH as u32 - 1;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SynthError {
    #[error("depth {depth} exceeds the maximum of {max}")]
    DepthLimit { depth: u32, max: u32 },

    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),

    #[error("depth exhausted at '{symbol}', which has no argument-free production")]
    DepthExhausted { symbol: String },
}

/// Result of one derivation.
#[derive(Clone, Debug, PartialEq)]
pub struct Derivation {
    pub root: Node,
    /// Number of nodes built, equal to `root.node_count()`.
    pub nodes: u32,
}

/// Index of the first entry whose cumulative weight strictly exceeds `u * total`.
///
/// Returns `None` when no weight is positive.
pub fn choose_weighted(weights: &[f32], u: f32) -> Option<usize> {
    let total: f32 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    let threshold = u * total;
    let mut acc = 0.0;
    for (i, w) in weights.iter().enumerate() {
        acc += w;
        if acc > threshold {
            return Some(i);
        }
    }
    // Rounding can leave `acc` at or below `threshold` for `u` close to 1.
    weights.iter().rposition(|w| *w > 0.0)
}

/// Derive a tree from `start`, allowing at most `max_depth` expansions before falling back to
/// the terminal symbol.
#[tracing::instrument(level = "debug", skip(grammar, rng))]
pub fn derive(
    grammar: &Grammar,
    start: &str,
    max_depth: u32,
    rng: &mut impl RandomSource,
) -> Result<Derivation, SynthError> {
    if max_depth > MAX_DEPTH {
        return Err(SynthError::DepthLimit {
            depth: max_depth,
            max: MAX_DEPTH,
        });
    }
    let mut synth = Synthesizer {
        grammar,
        rng,
        ids: IdAllocator::new(),
    };
    let root = synth.symbol(start, max_depth)?;
    let nodes = synth.ids.allocated();
    tracing::debug!(nodes, depth = root.depth(), "derived expression");
    Ok(Derivation { root, nodes })
}

struct Synthesizer<'g, 'r, R: RandomSource> {
    grammar: &'g Grammar,
    rng: &'r mut R,
    ids: IdAllocator,
}

impl<'g, R: RandomSource> Synthesizer<'g, '_, R> {
    fn symbol(&mut self, symbol: &str, depth: u32) -> Result<Node, SynthError> {
        let production = if depth == 0 {
            if self.grammar.contains(TERMINAL_SYMBOL) {
                self.pick(TERMINAL_SYMBOL, |_| true)?
            } else {
                self.pick(symbol, Production::is_terminal)?
            }
        } else {
            self.pick(symbol, |_| true)?
        };

        match &production.target {
            Target::Alias(next) => self.symbol(next, depth.saturating_sub(1)),
            Target::Node(kind) => {
                let kind = *kind;
                let mut children = Vec::with_capacity(kind.arity());
                for child in production.symbols() {
                    children.push(self.symbol(child, depth.saturating_sub(1))?);
                }

                let mut literals = production.literals();
                let params = kind
                    .params()
                    .iter()
                    .map(|spec| {
                        literals
                            .next()
                            .unwrap_or_else(|| self.rng.range(spec.lo, spec.hi))
                    })
                    .collect();

                let id = self.ids.alloc();
                Ok(Node::new(id, kind, children, params))
            }
        }
    }

    /// Weighted choice among the productions of `symbol` accepted by `filter`.
    fn pick(
        &mut self,
        symbol: &str,
        filter: impl Fn(&Production) -> bool,
    ) -> Result<&'g Production, SynthError> {
        let grammar = self.grammar;
        let productions = grammar
            .productions(symbol)
            .ok_or_else(|| SynthError::UnknownSymbol(symbol.to_owned()))?;

        let candidates: Vec<&Production> = productions.iter().filter(|p| filter(p)).collect();
        let weights: Vec<f32> = candidates.iter().map(|p| p.weight).collect();
        let u = self.rng.next_f32();
        choose_weighted(&weights, u)
            .map(|i| candidates[i])
            .ok_or_else(|| SynthError::DepthExhausted {
                symbol: symbol.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::kind::NodeKind;
    use crate::foundation::rng::Rng;

    /// Replays fixed draws, then repeats the last one.
    struct Forced(Vec<f32>, usize);

    impl RandomSource for Forced {
        fn next_f32(&mut self) -> f32 {
            let v = self.0[self.1.min(self.0.len() - 1)];
            self.1 += 1;
            v
        }
    }

    #[test]
    fn weighted_choice_is_strictly_greater() {
        assert_eq!(choose_weighted(&[1.0, 1.0], 0.5), Some(1));
        assert_eq!(choose_weighted(&[1.0, 1.0], 0.499), Some(0));
        assert_eq!(choose_weighted(&[1.0, 1.0], 0.0), Some(0));
        assert_eq!(choose_weighted(&[0.0, 3.0], 0.0), Some(1));
        assert_eq!(choose_weighted(&[1.0, 3.0], 0.99), Some(1));
        assert_eq!(choose_weighted(&[0.0, 0.0], 0.3), None);
        assert_eq!(choose_weighted(&[], 0.3), None);
    }

    #[test]
    fn depth_one_falls_back_to_terminal_productions() {
        let g = Grammar::compile("E :: triple(C,C,C):1\nC :: x:1").unwrap();
        let d = derive(&g, "E", 1, &mut Rng::seed(1)).unwrap();
        assert_eq!(d.root.to_string(), "triple(x, x, x)");
        assert_eq!(d.nodes, 4);
        assert_eq!(d.root.eval(0.5, 0.5, 0.0), [0.5, 0.5, 0.5]);
    }

    #[test]
    fn ids_are_allocated_children_first() {
        let g = Grammar::compile("E :: sum(C, C):1\nC :: x:1").unwrap();
        let d = derive(&g, "E", 3, &mut Rng::seed(9)).unwrap();
        let mut ids = Vec::new();
        d.root.walk_post_order(&mut |n| ids.push(n.id().0));
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn exhausted_depth_uses_the_terminal_symbol() {
        let g = Grammar::compile("A :: sin(A):1 | Z:1\nZ :: y:1").unwrap();
        // Always pick `sin` while depth remains.
        let d = derive(&g, "A", 4, &mut Forced(vec![0.0], 0)).unwrap();
        assert_eq!(d.root.depth(), 5);
        let mut leaf = &d.root;
        while let Some(c) = leaf.children().first() {
            assert_eq!(leaf.kind(), NodeKind::Sin);
            leaf = c;
        }
        assert_eq!(leaf.kind(), NodeKind::Y);
    }

    #[test]
    fn literals_fill_parameters_in_order() {
        let g = Grammar::compile("A :: sin(Z, 2):1\nZ :: rgb(0.5):1").unwrap();
        let d = derive(&g, "A", 2, &mut Forced(vec![0.5], 0)).unwrap();
        let sin = &d.root;
        assert_eq!(sin.params()[0], 2.0);
        // phase drawn from [0, pi) at u = 0.5
        assert!((sin.params()[1] - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(sin.children()[0].params(), &[0.5, 0.0, 0.0]);
    }

    #[test]
    fn recursive_symbol_without_exit_is_an_error() {
        let g = Grammar::compile("A :: sum(A, A):1").unwrap();
        let err = derive(&g, "A", 3, &mut Rng::seed(0)).unwrap_err();
        assert_eq!(
            err,
            SynthError::DepthExhausted {
                symbol: "A".to_owned()
            }
        );
    }

    #[test]
    fn depth_is_capped() {
        let g = Grammar::compile("A :: sqrt(A):1\nZ :: x:1").unwrap();
        let d = derive(&g, "A", MAX_DEPTH, &mut Rng::seed(3)).unwrap();
        assert_eq!(d.root.depth(), MAX_TREE_DEPTH);
        assert_eq!(
            crate::expression::parse_expression(&d.root.to_string()).unwrap(),
            d.root
        );

        let err = derive(&g, "A", 200_000, &mut Rng::seed(3)).unwrap_err();
        assert_eq!(
            err,
            SynthError::DepthLimit {
                depth: 200_000,
                max: MAX_DEPTH
            }
        );
    }

    #[test]
    fn unknown_start_symbol_is_an_error() {
        let g = Grammar::compile("A :: x:1").unwrap();
        assert_eq!(
            derive(&g, "B", 3, &mut Rng::seed(0)).unwrap_err(),
            SynthError::UnknownSymbol("B".to_owned())
        );
    }

    #[test]
    fn same_seed_same_tree() {
        let g = crate::grammar::presets::preset("all").unwrap().compile().unwrap();
        let a = derive(&g, g.start_symbol(), 8, &mut Rng::seed(42)).unwrap();
        let b = derive(&g, g.start_symbol(), 8, &mut Rng::seed(42)).unwrap();
        assert_eq!(a.root.to_string(), b.root.to_string());
        assert_eq!(a.nodes as usize, a.root.node_count());
    }
}
