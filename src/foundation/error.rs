use crate::expression::error::ParseError;
use crate::grammar::GrammarError;
use crate::synth::SynthError;

pub type RandomartResult<T> = Result<T, RandomartError>;

#[derive(thiserror::Error, Debug)]
pub enum RandomartError {
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),

    #[error("expression parse error: {0}")]
    ExpressionParse(#[from] ParseError),

    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RandomartError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// `true` for failures raised while turning grammar or expression text into a tree.
    pub fn is_derive_error(&self) -> bool {
        matches!(
            self,
            Self::Grammar(_) | Self::ExpressionParse(_) | Self::Synthesis(_) | Self::Validation(_)
        )
    }
}
