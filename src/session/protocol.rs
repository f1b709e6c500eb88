//! Messages exchanged between a host and the session engine.

use std::time::Duration;

use crate::foundation::core::{FrameRGBA, Variables};
use crate::foundation::error::{RandomartError, RandomartResult};
use crate::grammar::presets::{self, DEFAULT_PRESET};
use crate::synth::MAX_DEPTH;
pub use crate::render::Executor;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a session's expression tree comes from.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionSource {
    /// Derive a tree from grammar text.
    Grammar { text: String, depth: u32, seed: u32 },
    /// Parse a canonical expression string.
    Expression(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Evaluate the tree per pixel, coarse to fine, one step per request.
    #[default]
    Interpreted,
    /// Compile once and render the full frame in a single pass.
    Compiled(Executor),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StartRequest {
    pub source: ExpressionSource,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub backend: Backend,
    /// Value of the `t` coordinate.
    #[serde(default)]
    pub time: f32,
    /// Initial variable feed, replaced later by `SetVariables`.
    #[serde(default)]
    pub variables: Variables,
}

impl Default for StartRequest {
    fn default() -> Self {
        let basic = presets::preset(DEFAULT_PRESET).map_or((String::new(), 12), |p| {
            (p.text.to_owned(), p.depth)
        });
        Self {
            source: ExpressionSource::Grammar {
                text: basic.0,
                depth: basic.1,
                seed: 0,
            },
            width: 512,
            height: 512,
            backend: Backend::Interpreted,
            time: 0.0,
            variables: Variables::NONE,
        }
    }
}

impl StartRequest {
    pub fn grammar(text: impl Into<String>, depth: u32, seed: u32) -> Self {
        Self {
            source: ExpressionSource::Grammar {
                text: text.into(),
                depth,
                seed,
            },
            ..Self::default()
        }
    }

    pub fn expression(text: impl Into<String>) -> Self {
        Self {
            source: ExpressionSource::Expression(text.into()),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn validate(&self) -> RandomartResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RandomartError::validation(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.time.is_finite() {
            return Err(RandomartError::validation("time must be finite"));
        }
        if let ExpressionSource::Grammar { depth, .. } = self.source
            && depth > MAX_DEPTH
        {
            return Err(RandomartError::validation(format!(
                "depth {depth} exceeds the maximum of {MAX_DEPTH}"
            )));
        }
        Ok(())
    }
}

/// Lifecycle of one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Deriving,
    Rendering,
    Done,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// Grammar, expression text, or synthesis failed; nothing was rendered.
    #[error("derivation failed: {0}")]
    Derive(#[source] RandomartError),

    /// The tree exists but a backend could not render it.
    #[error("render failed: {0}")]
    Render(#[source] RandomartError),
}

impl SessionError {
    pub fn inner(&self) -> &RandomartError {
        match self {
            Self::Derive(e) | Self::Render(e) => e,
        }
    }
}

/// Host → engine.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Start(StartRequest),
    /// Render the next refinement step (interpreted backend).
    Next,
    SetVariables(Variables),
}

/// Engine → host. Every event names the session that produced it.
#[derive(Debug)]
pub enum Event {
    Expression {
        session: SessionId,
        canonical: String,
        shader: String,
    },
    Progress {
        session: SessionId,
        current: u32,
        total: u32,
        image: FrameRGBA,
        width: u32,
        height: u32,
        elapsed: Duration,
    },
    Failed {
        session: SessionId,
        error: SessionError,
    },
}

impl Event {
    pub fn session(&self) -> SessionId {
        match self {
            Event::Expression { session, .. }
            | Event::Progress { session, .. }
            | Event::Failed { session, .. } => *session,
        }
    }

    /// `true` for the last `Progress` of a render.
    pub fn is_final_progress(&self) -> bool {
        matches!(self, Event::Progress { current, total, .. } if current == total)
    }
}
