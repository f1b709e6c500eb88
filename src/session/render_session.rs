use crate::expression::node::Node;
use crate::expression::parser::parse_expression;
use crate::foundation::core::Variables;
use crate::foundation::error::{RandomartError, RandomartResult};
use crate::foundation::rng::Rng;
use crate::grammar::Grammar;
use crate::render::shader::{CompiledArt, compute_shader};
use crate::render::{ProgramExecutor, ProgressiveRender, create_executor};
use crate::session::protocol::{
    Backend, Event, ExpressionSource, SessionError, SessionId, SessionState, StartRequest,
};
use crate::synth::derive;

enum Renderer {
    Interpreted(ProgressiveRender),
    Compiled {
        art: CompiledArt,
        executor: Box<dyn ProgramExecutor>,
        /// A pass is owed, either the first one or one after new variables.
        pending: bool,
    },
}

/// Synchronous state machine behind one engine session.
///
/// [`derive`](Self::derive) moves `Idle → Deriving → Rendering`, each
/// [`advance`](Self::advance) produces one progress event until `Done`. Failures end in `Failed`.
pub struct RenderSession {
    id: SessionId,
    request: StartRequest,
    state: SessionState,
    root: Option<Node>,
    renderer: Option<Renderer>,
    vars: Variables,
}

impl RenderSession {
    pub fn new(id: SessionId, request: StartRequest) -> Self {
        let vars = request.variables;
        Self {
            id,
            request,
            state: SessionState::Idle,
            root: None,
            renderer: None,
            vars,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request(&self) -> &StartRequest {
        &self.request
    }

    /// The derived tree, once derivation succeeded.
    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Build the tree and the renderer. Returns `Expression` or `Failed`.
    #[tracing::instrument(level = "info", skip(self), fields(session = self.id.0))]
    pub fn derive(&mut self) -> Event {
        if self.state != SessionState::Idle {
            return self.fail(SessionError::Derive(RandomartError::validation(format!(
                "session {} already left the idle state",
                self.id
            ))));
        }
        self.state = SessionState::Deriving;

        let root = match self.request.validate().and_then(|()| build_tree(&self.request.source)) {
            Ok(root) => root,
            Err(e) => return self.fail(SessionError::Derive(e)),
        };
        let canonical = root.to_string();
        tracing::info!(nodes = root.node_count(), depth = root.depth(), "derived expression");

        let (renderer, shader) = match self.prepare(&root) {
            Ok(r) => r,
            Err(e) => return self.fail(SessionError::Render(e)),
        };

        self.root = Some(root);
        self.renderer = Some(renderer);
        self.state = SessionState::Rendering;
        Event::Expression {
            session: self.id,
            canonical,
            shader,
        }
    }

    fn prepare(&self, root: &Node) -> RandomartResult<(Renderer, String)> {
        let StartRequest {
            width,
            height,
            time,
            backend,
            ..
        } = self.request;
        match backend {
            Backend::Interpreted => Ok((
                Renderer::Interpreted(ProgressiveRender::new(width, height, time)?),
                compute_shader(root),
            )),
            Backend::Compiled(kind) => {
                let art = CompiledArt::compile(root)?;
                let executor = create_executor(kind)?;
                let shader = art.shader.clone();
                Ok((
                    Renderer::Compiled {
                        art,
                        executor,
                        pending: true,
                    },
                    shader,
                ))
            }
        }
    }

    /// Render the next step. `None` when there is nothing left to do.
    pub fn advance(&mut self) -> Option<Event> {
        if self.state != SessionState::Rendering {
            return None;
        }
        let (Some(root), Some(renderer)) = (&self.root, &mut self.renderer) else {
            return Some(self.fail(SessionError::Render(RandomartError::backend(
                "session has no tree to render",
            ))));
        };
        let StartRequest {
            width,
            height,
            time,
            ..
        } = self.request;

        let event = match renderer {
            Renderer::Interpreted(progressive) => {
                let step = progressive.step(root, &self.vars)?;
                if step.current == step.total {
                    self.state = SessionState::Done;
                }
                Event::Progress {
                    session: self.id,
                    current: step.current,
                    total: step.total,
                    width: step.frame.width,
                    height: step.frame.height,
                    image: step.frame,
                    elapsed: step.elapsed,
                }
            }
            Renderer::Compiled {
                art,
                executor,
                pending,
            } => {
                if !*pending {
                    return None;
                }
                let started = std::time::Instant::now();
                let result = executor.execute(art, width, height, time, &self.vars);
                *pending = false;
                let image = match result {
                    Ok(image) => image,
                    Err(e) => return Some(self.fail(SessionError::Render(e))),
                };
                self.state = SessionState::Done;
                Event::Progress {
                    session: self.id,
                    current: 1,
                    total: 1,
                    width: image.width,
                    height: image.height,
                    image,
                    elapsed: started.elapsed(),
                }
            }
        };
        Some(event)
    }

    /// Replace the variable feed. Returns `true` when the image has to be rendered again.
    pub fn set_variables(&mut self, vars: Variables) -> bool {
        self.vars = vars;
        let reads = self.root.as_ref().is_some_and(Node::reads_variables);
        if !reads || !matches!(self.state, SessionState::Rendering | SessionState::Done) {
            return false;
        }
        match &mut self.renderer {
            Some(Renderer::Interpreted(progressive)) => progressive.rewind(),
            Some(Renderer::Compiled { pending, .. }) => *pending = true,
            None => return false,
        }
        self.state = SessionState::Rendering;
        true
    }

    /// Abandon the session if it is still working.
    pub fn cancel(&mut self) {
        if matches!(self.state, SessionState::Deriving | SessionState::Rendering) {
            tracing::debug!(session = self.id.0, "session cancelled");
            self.state = SessionState::Cancelled;
        }
    }

    fn fail(&mut self, error: SessionError) -> Event {
        tracing::warn!(session = self.id.0, %error, "session failed");
        self.state = SessionState::Failed;
        Event::Failed {
            session: self.id,
            error,
        }
    }
}

/// Parse or derive the tree named by `source`.
pub fn build_tree(source: &ExpressionSource) -> RandomartResult<Node> {
    match source {
        ExpressionSource::Expression(text) => Ok(parse_expression(text)?),
        ExpressionSource::Grammar { text, depth, seed } => {
            let grammar = Grammar::compile(text)?;
            let mut rng = Rng::seed(*seed);
            let derivation = derive(&grammar, grammar.start_symbol(), *depth, &mut rng)?;
            Ok(derivation.root)
        }
    }
}
