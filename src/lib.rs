#![forbid(unsafe_code)]

pub mod foundation {
    pub mod core;
    pub mod error;
    pub mod rng;
}

pub mod expression;
pub mod grammar;
pub mod render;
pub mod session;
pub mod synth;

pub use expression::{Node, NodeId, NodeKind, ParseError, Program, parse_expression};
pub use foundation::core::{FrameRGBA, Rgb, Variable, Variables};
pub use foundation::error::{RandomartError, RandomartResult};
pub use foundation::rng::{RandomSource, Rng};
pub use grammar::presets::{PRESETS, Preset, preset};
pub use grammar::{Grammar, GrammarError};
pub use render::shader::CompiledArt;
pub use render::{Executor, ProgramExecutor, ProgressiveRender, create_executor};
pub use session::{
    Backend, Engine, EngineOpts, Event, ExpressionSource, Request, SessionError, SessionId,
    SessionState, StartRequest,
};
pub use synth::{Derivation, MAX_DEPTH, SynthError, derive};
