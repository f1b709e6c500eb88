use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::time::Duration;

use crate::foundation::core::Variables;
use crate::foundation::error::{RandomartError, RandomartResult};
use crate::session::protocol::{Event, Request, SessionId, SessionState, StartRequest};
use crate::session::render_session::RenderSession;

/// Options for [`Engine`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineOpts {
    /// Bounded capacity of each session's request and event channels.
    pub channel_capacity: usize,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            channel_capacity: 4,
        }
    }
}

/// Worker-side commands. `Start` never reaches a worker: it creates a new one.
enum Command {
    Next,
    SetVariables(Variables),
}

struct SessionHandle {
    id: SessionId,
    commands: SyncSender<Command>,
    events: Receiver<Event>,
    /// Last state implied by the events handed to the caller.
    observed: SessionState,
}

/// Caller-facing handle over at most one live session.
///
/// Every session runs on its own worker thread which owns the tree, the renderer and the memo
/// cache. Starting a new session drops the previous session's channels; its worker notices the
/// disconnect and exits without delivering anything else.
pub struct Engine {
    opts: EngineOpts,
    next_id: u64,
    current: Option<SessionHandle>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOpts::default())
    }
}

impl Engine {
    pub fn new(opts: EngineOpts) -> Self {
        Self {
            opts,
            next_id: 1,
            current: None,
        }
    }

    /// Start a session, superseding the current one.
    pub fn start(&mut self, request: StartRequest) -> RandomartResult<SessionId> {
        if let Some(old) = self.current.take()
            && !old.observed.is_terminal()
        {
            tracing::warn!(session = old.id.0, "superseding unfinished session");
        }

        let id = SessionId(self.next_id);
        self.next_id += 1;

        let cap = self.opts.channel_capacity.max(1);
        let (cmd_tx, cmd_rx) = mpsc::sync_channel::<Command>(cap);
        let (evt_tx, evt_rx) = mpsc::sync_channel::<Event>(cap);

        tracing::info!(
            session = id.0,
            backend = ?request.backend,
            width = request.width,
            height = request.height,
            "starting session"
        );
        let session = RenderSession::new(id, request);
        std::thread::Builder::new()
            .name(format!("randomart-session-{}", id.0))
            .spawn(move || run_session(session, cmd_rx, evt_tx))
            .map_err(|e| RandomartError::backend(format!("failed to spawn session worker: {e}")))?;

        self.current = Some(SessionHandle {
            id,
            commands: cmd_tx,
            events: evt_rx,
            observed: SessionState::Deriving,
        });
        Ok(id)
    }

    /// Ask for the next refinement step. Ignored by finished sessions.
    pub fn next(&self) -> RandomartResult<()> {
        self.command(Command::Next)
    }

    pub fn set_variables(&self, vars: Variables) -> RandomartResult<()> {
        self.command(Command::SetVariables(vars))
    }

    /// Dispatch any [`Request`]. Returns the new session id for `Start`.
    pub fn send(&mut self, request: Request) -> RandomartResult<Option<SessionId>> {
        match request {
            Request::Start(start) => self.start(start).map(Some),
            Request::Next => self.next().map(|()| None),
            Request::SetVariables(vars) => self.set_variables(vars).map(|()| None),
        }
    }

    fn command(&self, command: Command) -> RandomartResult<()> {
        let handle = self
            .current
            .as_ref()
            .ok_or_else(|| RandomartError::validation("no session has been started"))?;
        match handle.commands.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(RandomartError::backend(
                "session request queue is full; drain events first",
            )),
            Err(TrySendError::Disconnected(_)) => Err(RandomartError::backend(format!(
                "session {} worker has exited",
                handle.id
            ))),
        }
    }

    /// Current session id, if any.
    pub fn session(&self) -> Option<SessionId> {
        self.current.as_ref().map(|h| h.id)
    }

    /// State of the current session as implied by the events received so far.
    pub fn state(&self) -> SessionState {
        self.current
            .as_ref()
            .map_or(SessionState::Idle, |h| h.observed)
    }

    /// Block for the next event of the current session.
    ///
    /// `None` when there is no session or its worker has exited.
    pub fn recv(&mut self) -> Option<Event> {
        let handle = self.current.as_mut()?;
        let event = handle.events.recv().ok()?;
        observe(handle, &event);
        Some(event)
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Event> {
        let handle = self.current.as_mut()?;
        match handle.events.recv_timeout(timeout) {
            Ok(event) => {
                observe(handle, &event);
                Some(event)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        let handle = self.current.as_mut()?;
        match handle.events.try_recv() {
            Ok(event) => {
                observe(handle, &event);
                Some(event)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

fn observe(handle: &mut SessionHandle, event: &Event) {
    handle.observed = match event {
        Event::Expression { .. } => SessionState::Rendering,
        Event::Progress { current, total, .. } if current == total => SessionState::Done,
        Event::Progress { .. } => SessionState::Rendering,
        Event::Failed { .. } => SessionState::Failed,
    };
}

/// Worker loop: derive, render the first step, then serve commands until the handle is dropped.
fn run_session(mut session: RenderSession, commands: Receiver<Command>, events: SyncSender<Event>) {
    let span = tracing::info_span!("session", id = session.id().0);
    let _guard = span.enter();

    let first = session.derive();
    if events.send(first).is_err() {
        session.cancel();
        return;
    }
    if !emit(&mut session, &events) {
        return;
    }

    while let Ok(command) = commands.recv() {
        let keep_going = match command {
            Command::Next => emit(&mut session, &events),
            Command::SetVariables(vars) => {
                !session.set_variables(vars) || emit(&mut session, &events)
            }
        };
        if !keep_going {
            return;
        }
    }

    session.cancel();
    tracing::debug!(state = ?session.state(), "session handle dropped");
}

/// Send the next step, if any. `false` once the caller is gone.
fn emit(session: &mut RenderSession, events: &SyncSender<Event>) -> bool {
    let Some(event) = session.advance() else {
        return true;
    };
    if events.send(event).is_err() {
        session.cancel();
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::protocol::{Backend, Executor};

    const WAIT: Duration = Duration::from_secs(30);

    #[test]
    fn first_step_arrives_without_asking() {
        let mut engine = Engine::default();
        assert_eq!(engine.state(), SessionState::Idle);
        let id = engine
            .start(StartRequest::expression("sum(x, y)").with_size(8, 8))
            .unwrap();
        assert_eq!(engine.session(), Some(id));

        assert!(matches!(engine.recv_timeout(WAIT), Some(Event::Expression { .. })));
        match engine.recv_timeout(WAIT) {
            Some(Event::Progress { current: 1, total: 3, width: 2, height: 2, .. }) => {}
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(engine.state(), SessionState::Rendering);

        engine.next().unwrap();
        engine.next().unwrap();
        let mut last = None;
        for _ in 0..2 {
            last = engine.recv_timeout(WAIT);
        }
        assert!(last.is_some_and(|e| e.is_final_progress()));
        assert_eq!(engine.state(), SessionState::Done);

        // Ignored once done.
        engine.next().unwrap();
        assert!(engine.recv_timeout(Duration::from_millis(50)).is_none());
    }

    #[test]
    fn compiled_session_finishes_in_one_pass() {
        let mut engine = Engine::default();
        engine
            .start(
                StartRequest::expression("x")
                    .with_size(5, 3)
                    .with_backend(Backend::Compiled(Executor::Cpu)),
            )
            .unwrap();
        engine.recv_timeout(WAIT).unwrap();
        let event = engine.recv_timeout(WAIT).unwrap();
        assert!(event.is_final_progress());
        assert_eq!(engine.state(), SessionState::Done);
    }

    #[test]
    fn failures_are_reported_as_events() {
        let mut engine = Engine::default();
        engine
            .start(StartRequest::expression("sum(x)").with_size(4, 4))
            .unwrap();
        match engine.recv_timeout(WAIT) {
            Some(Event::Failed { error, .. }) => assert!(error.inner().is_derive_error()),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(engine.state(), SessionState::Failed);
    }

    #[test]
    fn deep_requests_fail_instead_of_aborting() {
        let mut engine = Engine::default();
        engine
            .start(StartRequest::grammar("A :: sqrt(A):1\nZ :: x:1", 20_000, 1).with_size(4, 4))
            .unwrap();
        match engine.recv_timeout(WAIT) {
            Some(Event::Failed { error, .. }) => {
                assert!(matches!(error.inner(), RandomartError::Validation(_)), "{error}");
            }
            other => panic!("unexpected event {other:?}"),
        }

        let nested = format!("{}x{}", "sqrt(".repeat(200_000), ")".repeat(200_000));
        engine
            .start(StartRequest::expression(nested).with_size(4, 4))
            .unwrap();
        match engine.recv_timeout(WAIT) {
            Some(Event::Failed { error, .. }) => {
                assert!(matches!(error.inner(), RandomartError::ExpressionParse(_)), "{error}");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn commands_without_a_session_are_rejected() {
        let engine = Engine::default();
        assert!(engine.next().is_err());
        assert!(engine.set_variables(Variables::NONE).is_err());
    }
}
