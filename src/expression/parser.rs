use crate::expression::error::ParseError;
use crate::expression::kind::NodeKind;
use crate::expression::lexer::{Span, Token, TokenKind, lex};
use crate::expression::node::{IdAllocator, MAX_TREE_DEPTH, Node};

/// Parse a canonical expression string (as produced by `Node`'s `Display`) back into a tree.
///
/// Node ids are allocated children-first, matching the order synthesis uses.
#[tracing::instrument(level = "debug", skip_all, fields(len = src.len()))]
pub fn parse_expression(src: &str) -> Result<Node, ParseError> {
    let tokens = lex(src.trim())?;
    let mut p = Parser {
        tokens,
        pos: 0,
        depth: 0,
        ids: IdAllocator::new(),
    };
    let node = p.parse_node()?;
    p.expect(TokenKind::Eof)?;
    Ok(node)
}

enum Arg {
    Node(Node),
    Number(f32),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Nesting of the node being parsed, 1 at the root.
    depth: usize,
    ids: IdAllocator,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> &Token {
        let t = &self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(ParseError::new(
                self.span().start,
                format!("expected {kind:?}, found {:?}", self.peek().kind),
            ))
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_node(&mut self) -> Result<Node, ParseError> {
        if self.depth >= MAX_TREE_DEPTH {
            return Err(ParseError::new(
                self.span().start,
                format!("expression nests deeper than {MAX_TREE_DEPTH} levels"),
            ));
        }
        self.depth += 1;
        let node = self.parse_call();
        self.depth -= 1;
        node
    }

    fn parse_call(&mut self) -> Result<Node, ParseError> {
        let t = self.bump().clone();
        let TokenKind::Ident(name) = t.kind else {
            return Err(ParseError::new(
                t.span.start,
                format!("expected node name, found {:?}", t.kind),
            ));
        };
        let kind = NodeKind::from_name(&name).ok_or_else(|| {
            ParseError::new(t.span.start, format!("unknown node kind '{name}'"))
        })?;

        let mut children = Vec::new();
        let mut params = Vec::new();
        if self.consume(TokenKind::LParen) && !self.consume(TokenKind::RParen) {
            loop {
                let arg_start = self.span().start;
                match self.parse_arg()? {
                    Arg::Node(n) => {
                        if !params.is_empty() {
                            return Err(ParseError::new(
                                arg_start,
                                "child expressions must come before numeric parameters",
                            ));
                        }
                        children.push(n);
                    }
                    Arg::Number(v) => params.push(v),
                }
                if self.consume(TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RParen)?;
                break;
            }
        }

        if children.len() != kind.arity() {
            return Err(ParseError::new(
                t.span.start,
                format!(
                    "'{name}' takes {} child expressions, found {}",
                    kind.arity(),
                    children.len()
                ),
            ));
        }
        if params.len() != kind.params().len() {
            return Err(ParseError::new(
                t.span.start,
                format!(
                    "'{name}' takes {} numeric parameters, found {}",
                    kind.params().len(),
                    params.len()
                ),
            ));
        }

        Ok(Node::new(self.ids.alloc(), kind, children, params))
    }

    fn parse_arg(&mut self) -> Result<Arg, ParseError> {
        let negative = self.consume(TokenKind::Minus);
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Number(v) => {
                self.bump();
                Ok(Arg::Number(if negative { -v } else { v }))
            }
            TokenKind::Ident(_) if !negative => Ok(Arg::Node(self.parse_node()?)),
            other => Err(ParseError::new(
                t.span.start,
                format!("expected expression or number, found {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_terminals() {
        let n = parse_expression("x").unwrap();
        assert_eq!(n.kind(), NodeKind::X);
        let n = parse_expression(" y() ").unwrap();
        assert_eq!(n.kind(), NodeKind::Y);
    }

    #[test]
    fn parses_nested_calls_with_params() {
        let n = parse_expression("triple(sin(x, 2, 0.5), bw(-0.25), level(x, y, t, 0.1))").unwrap();
        assert_eq!(n.kind(), NodeKind::Triple);
        assert_eq!(n.children()[0].params(), &[2.0, 0.5]);
        assert_eq!(n.children()[1].params(), &[-0.25]);
        assert_eq!(n.children()[2].params(), &[0.1]);
    }

    #[test]
    fn ids_are_children_first() {
        let n = parse_expression("sum(x, y)").unwrap();
        assert_eq!(n.children()[0].id().0, 0);
        assert_eq!(n.children()[1].id().0, 1);
        assert_eq!(n.id().0, 2);
    }

    #[test]
    fn rejects_wrong_child_count() {
        let err = parse_expression("sum(x)").unwrap_err();
        assert!(err.message.contains("takes 2 child"), "{err}");
    }

    #[test]
    fn rejects_missing_params() {
        let err = parse_expression("sin(x)").unwrap_err();
        assert!(err.message.contains("numeric parameters"), "{err}");
    }

    #[test]
    fn rejects_unknown_kinds_and_trailing_input() {
        assert!(parse_expression("sinbin(x, y)").is_err());
        assert!(parse_expression("x y").is_err());
        assert!(parse_expression("sum(x, y").is_err());
        assert!(parse_expression("").is_err());
        assert!(parse_expression("-x").is_err());
        assert!(parse_expression("bw(-1e40)").is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = |levels: usize| format!("{}x{}", "sqrt(".repeat(levels), ")".repeat(levels));

        let at_limit = parse_expression(&nested(MAX_TREE_DEPTH - 1)).unwrap();
        assert_eq!(at_limit.depth(), MAX_TREE_DEPTH);

        let err = parse_expression(&nested(MAX_TREE_DEPTH)).unwrap_err();
        assert!(err.message.contains("nests deeper"), "{err}");

        let err = parse_expression(&nested(200_000)).unwrap_err();
        assert!(err.message.contains("nests deeper"), "{err}");
    }

    #[test]
    fn display_round_trips() {
        let src = "mix(sin(x, 2, 0.5), mod(y, bw(0)), rgb(-0.25, 0, 1))";
        let n = parse_expression(src).unwrap();
        assert_eq!(n.to_string(), src);
    }
}
