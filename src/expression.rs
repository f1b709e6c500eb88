//! Expression nodes: evaluation, canonical text form, WGSL generation and the register VM.

pub mod bytecode;
pub mod codegen;
pub mod error;
pub mod kind;
pub(crate) mod lexer;
pub mod node;
pub mod parser;
pub mod vm;

pub use bytecode::Program;
pub use error::ParseError;
pub use kind::{NodeKind, ParamSpec};
pub use node::{IdAllocator, MAX_TREE_DEPTH, Node, NodeId};
pub use parser::parse_expression;
