//! Weighted grammar text → symbol table.
//!
//! ```text
//! # comment
//! A :: triple(B, B, B):1
//! B :: Z:1 | sin(B):2 | sin(B, 2):1 | mix(B, B, B):1
//! Z :: x:1 | y:1 | rgb:1
//! ```

pub mod presets;

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use crate::expression::kind::NodeKind;
use crate::foundation::core::Variable;

/// Symbol the synthesizer falls back to once the depth budget is spent.
pub const TERMINAL_SYMBOL: &str = "Z";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GrammarError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: symbol '{symbol}' has no productions")]
    EmptySymbol { line: usize, symbol: String },

    #[error("line {line}: unknown node kind '{name}'")]
    UnknownNodeKind { line: usize, name: String },

    #[error("line {line}: unknown symbol '{symbol}'")]
    UnknownSymbol { line: usize, symbol: String },

    #[error("line {line}: '{name}' takes {expected} arguments, found {found}")]
    ArityMismatch {
        line: usize,
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid weight '{weight}'")]
    InvalidWeight { line: usize, weight: String },

    #[error("line {line}: symbol '{symbol}' is defined twice")]
    DuplicateSymbol { line: usize, symbol: String },

    #[error("line {line}: terminal symbol '{symbol}' may only list argument-free node kinds")]
    NonTerminalFallback { line: usize, symbol: String },

    #[error("grammar defines no symbols")]
    Empty,
}

/// One argument of a production.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    /// Derive a child from this symbol.
    Symbol(String),
    /// Fix the next literal parameter of the node kind.
    Literal(f32),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Node(NodeKind),
    /// Expand another symbol without building a node.
    Alias(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Production {
    pub target: Target,
    pub args: Vec<Arg>,
    pub weight: f32,
}

impl Production {
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|a| match a {
            Arg::Symbol(s) => Some(s.as_str()),
            Arg::Literal(_) => None,
        })
    }

    pub fn literals(&self) -> impl Iterator<Item = f32> + '_ {
        self.args.iter().filter_map(|a| match a {
            Arg::Literal(v) => Some(*v),
            Arg::Symbol(_) => None,
        })
    }

    /// `true` for node productions without children.
    pub fn is_terminal(&self) -> bool {
        matches!(self.target, Target::Node(k) if k.arity() == 0)
    }
}

/// Compiled grammar: symbols in declaration order, each with its weighted productions.
#[derive(Clone, Debug, PartialEq)]
pub struct Grammar {
    symbols: Vec<(String, Vec<Production>)>,
    index: HashMap<String, usize>,
}

impl Grammar {
    #[tracing::instrument(level = "debug", skip_all, fields(len = text.len()))]
    pub fn compile(text: &str) -> Result<Self, GrammarError> {
        let mut raw: Vec<RawSymbol> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let sym = parse_line(line, line_no)?;
            if index.contains_key(&sym.name) {
                return Err(GrammarError::DuplicateSymbol {
                    line: line_no,
                    symbol: sym.name,
                });
            }
            index.insert(sym.name.clone(), raw.len());
            raw.push(sym);
        }

        if raw.is_empty() {
            return Err(GrammarError::Empty);
        }

        let mut symbols = Vec::with_capacity(raw.len());
        for sym in raw {
            let mut productions = Vec::with_capacity(sym.productions.len());
            for p in sym.productions {
                productions.push(resolve(p, sym.line, &index)?);
            }

            let total: f32 = productions.iter().map(|p| p.weight).sum();
            if !(total > 0.0 && total.is_finite()) {
                return Err(GrammarError::InvalidWeight {
                    line: sym.line,
                    weight: format!("{total} (total of '{}')", sym.name),
                });
            }

            if sym.name == TERMINAL_SYMBOL && !productions.iter().all(Production::is_terminal) {
                return Err(GrammarError::NonTerminalFallback {
                    line: sym.line,
                    symbol: sym.name,
                });
            }

            symbols.push((sym.name, productions));
        }

        tracing::debug!(symbols = symbols.len(), "compiled grammar");
        Ok(Self { symbols, index })
    }

    /// The first declared symbol.
    pub fn start_symbol(&self) -> &str {
        &self.symbols[0].0
    }

    pub fn productions(&self, symbol: &str) -> Option<&[Production]> {
        self.index
            .get(symbol)
            .map(|&i| self.symbols[i].1.as_slice())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|(s, _)| s.as_str())
    }

    /// Named input variables any production can produce.
    pub fn variables(&self) -> BTreeSet<Variable> {
        self.symbols
            .iter()
            .flat_map(|(_, ps)| ps)
            .filter_map(|p| match p.target {
                Target::Node(NodeKind::Var(v)) => Some(v),
                _ => None,
            })
            .collect()
    }
}

impl FromStr for Grammar {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

struct RawSymbol {
    name: String,
    line: usize,
    productions: Vec<RawProduction>,
}

struct RawProduction {
    name: String,
    args: Vec<Arg>,
    weight: f32,
}

fn parse_line(line: &str, line_no: usize) -> Result<RawSymbol, GrammarError> {
    let syntax = |message: String| GrammarError::Syntax {
        line: line_no,
        message,
    };

    let Some((lhs, rhs)) = line.split_once("::") else {
        return Err(syntax("expected 'SYMBOL :: production | ...'".to_owned()));
    };
    if rhs.contains("::") {
        return Err(syntax("more than one '::'".to_owned()));
    }

    let name = lhs.trim();
    if !is_ident(name) {
        return Err(syntax(format!("invalid symbol name '{name}'")));
    }

    let rhs = rhs.trim();
    if rhs.is_empty() {
        return Err(GrammarError::EmptySymbol {
            line: line_no,
            symbol: name.to_owned(),
        });
    }

    let mut productions = Vec::new();
    for (j, part) in rhs.split('|').enumerate() {
        let part = part.trim();
        if part.is_empty() {
            return Err(syntax(format!("production {} is empty", j + 1)));
        }
        productions.push(parse_production(part, line_no, j + 1)?);
    }

    Ok(RawSymbol {
        name: name.to_owned(),
        line: line_no,
        productions,
    })
}

fn parse_production(
    src: &str,
    line_no: usize,
    index: usize,
) -> Result<RawProduction, GrammarError> {
    let syntax = |message: String| GrammarError::Syntax {
        line: line_no,
        message: format!("production {index}: {message}"),
    };

    let Some((head, weight)) = src.rsplit_once(':') else {
        return Err(syntax(format!("'{src}' is missing ':weight'")));
    };

    let weight_src = weight.trim();
    let weight = match weight_src.parse::<f32>() {
        Ok(w) if w.is_finite() && w >= 0.0 => w,
        _ => {
            return Err(GrammarError::InvalidWeight {
                line: line_no,
                weight: weight_src.to_owned(),
            });
        }
    };

    let head = head.trim();
    let (name, args) = match head.split_once('(') {
        None => (head, Vec::new()),
        Some((name, rest)) => {
            let Some(inner) = rest.trim_end().strip_suffix(')') else {
                return Err(syntax(format!("unbalanced parentheses in '{head}'")));
            };
            if inner.contains(['(', ')']) {
                return Err(syntax(format!("nested parentheses in '{head}'")));
            }
            if inner.trim().is_empty() {
                return Err(syntax(format!("empty argument list in '{head}'")));
            }
            let mut args = Vec::new();
            for a in inner.split(',') {
                args.push(parse_arg(a.trim()).ok_or_else(|| {
                    syntax(format!("invalid argument '{}' in '{head}'", a.trim()))
                })?);
            }
            (name.trim(), args)
        }
    };

    if !is_ident(name) {
        return Err(syntax(format!("invalid name '{name}'")));
    }

    Ok(RawProduction {
        name: name.to_owned(),
        args,
        weight,
    })
}

fn parse_arg(src: &str) -> Option<Arg> {
    if is_ident(src) {
        return Some(Arg::Symbol(src.to_owned()));
    }
    match src.parse::<f32>() {
        Ok(v) if v.is_finite() => Some(Arg::Literal(v)),
        _ => None,
    }
}

fn resolve(
    p: RawProduction,
    line: usize,
    index: &HashMap<String, usize>,
) -> Result<Production, GrammarError> {
    if let Some(kind) = NodeKind::from_name(&p.name) {
        let symbols = p
            .args
            .iter()
            .filter(|a| matches!(a, Arg::Symbol(_)))
            .count();
        let literals = p.args.len() - symbols;
        let max_literals = kind.params().len();
        if symbols != kind.arity() || literals > max_literals {
            return Err(GrammarError::ArityMismatch {
                line,
                name: p.name,
                expected: kind.arity() + if literals > max_literals { max_literals } else { 0 },
                found: p.args.len(),
            });
        }
        for a in &p.args {
            if let Arg::Symbol(s) = a
                && !index.contains_key(s)
            {
                return Err(GrammarError::UnknownSymbol {
                    line,
                    symbol: s.clone(),
                });
            }
        }
        return Ok(Production {
            target: Target::Node(kind),
            args: p.args,
            weight: p.weight,
        });
    }

    if index.contains_key(&p.name) {
        if !p.args.is_empty() {
            return Err(GrammarError::Syntax {
                line,
                message: format!("symbol '{}' cannot take arguments", p.name),
            });
        }
        return Ok(Production {
            target: Target::Alias(p.name),
            args: Vec::new(),
            weight: p.weight,
        });
    }

    Err(GrammarError::UnknownNodeKind { line, name: p.name })
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
