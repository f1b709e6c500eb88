//! Sessions: one derivation and its render, driven through message passing.

pub mod engine;
pub mod protocol;
pub mod render_session;

pub use engine::{Engine, EngineOpts};
pub use protocol::{
    Backend, Event, Executor, ExpressionSource, Request, SessionError, SessionId, SessionState,
    StartRequest,
};
pub use render_session::{RenderSession, build_tree};
