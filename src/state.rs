//! The core state machine.
//!
//! There are really several machines in here: the client state, the server
//! state, the keep-alive latch, and the set of pending protocol-switch
//! proposals. Each sees a subset of the events. On top of the per-event
//! transitions there are *coupling* rules between the machines, applied
//! repeatedly after every change until nothing moves anymore; that is what
//! turns "the peer closed and we are done" into "we must close too" without
//! caring about the order things happened in.
//!
//! This module does not know which role is local. It only knows about
//! request/response cycles in the abstract, so the same rules apply to both
//! parties.

use crate::error::Error;
use crate::event::EventKind;

/// Which side of the connection an endpoint plays. Fixed for the lifetime of
/// the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn peer(self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

/// Per-role connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Awaiting the start of a new message in this direction.
    Idle,
    /// Server only: the request is in, a response start line must follow.
    SendResponse,
    /// Start line sent or received; body transfer in progress.
    SendBody,
    /// `EndOfMessage` sent or received; waiting for the peer to finish.
    Done,
    /// No further cycles; this side has to close once it is finished.
    MustClose,
    /// This side has sent or received the shutdown signal.
    Closed,
    /// Client only: a switch proposal is out, the response will decide.
    MightSwitchProtocol,
    /// Handoff complete; further bytes are not HTTP.
    SwitchedProtocol,
    /// Terminal failure state.
    Error,
}

/// A protocol switch the client can propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Switch {
    Upgrade,
    Connect,
}

/// Context the connection attaches to a server response event, changing
/// which transition fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Annotation {
    /// `101 Switching Protocols` answering an Upgrade proposal.
    SwitchUpgrade,
    /// A 2xx response answering a CONNECT proposal.
    SwitchConnect,
    /// Sending a response whose framing is no-body: the server is done
    /// without a separate `EndOfMessage`.
    ResponseWithoutBody,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SwitchProposals {
    upgrade: bool,
    connect: bool,
}

impl SwitchProposals {
    fn any(self) -> bool {
        self.upgrade || self.connect
    }

    fn contains(self, switch: Switch) -> bool {
        match switch {
            Switch::Upgrade => self.upgrade,
            Switch::Connect => self.connect,
        }
    }

    fn insert(&mut self, switch: Switch) {
        match switch {
            Switch::Upgrade => self.upgrade = true,
            Switch::Connect => self.connect = true,
        }
    }

    fn clear(&mut self) {
        *self = SwitchProposals::default();
    }
}

/// The joint state of both sides plus the sub-machines.
#[derive(Debug)]
pub(crate) struct ConnectionState {
    /// Once false, never true again for this connection.
    pub keep_alive: bool,
    proposals: SwitchProposals,
    client: State,
    server: State,
}

impl ConnectionState {
    pub fn new() -> Self {
        ConnectionState {
            keep_alive: true,
            proposals: SwitchProposals::default(),
            client: State::Idle,
            server: State::Idle,
        }
    }

    pub fn state(&self, role: Role) -> State {
        match role {
            Role::Client => self.client,
            Role::Server => self.server,
        }
    }

    /// Is this kind of switch proposal still waiting for its answer?
    pub fn pending(&self, switch: Switch) -> bool {
        self.proposals.contains(switch)
    }

    fn set_state(&mut self, role: Role, state: State) {
        match role {
            Role::Client => self.client = state,
            Role::Server => self.server = state,
        }
    }

    /// The keep-alive latch saw a disabling condition.
    pub fn process_keep_alive_disabled(&mut self) {
        self.keep_alive = false;
        self.couple();
    }

    /// The client proposed a protocol switch in its request. Registered
    /// before the request event fires, so an illegal request still reports
    /// through the transition check rather than here.
    pub fn process_client_switch_proposal(&mut self, switch: Switch) {
        self.proposals.insert(switch);
        self.couple();
    }

    pub fn process_error(&mut self, role: Role) {
        self.set_state(role, State::Error);
        self.couple();
    }

    /// Feed one event through the machine for `role`. A `Request` also
    /// advances the server machine, which is the one place both machines see
    /// the same event.
    pub fn process_event(
        &mut self,
        role: Role,
        kind: EventKind,
        annotation: Option<Annotation>,
    ) -> Result<(), Error> {
        if let Some(Annotation::SwitchUpgrade) = annotation {
            if !self.proposals.contains(Switch::Upgrade) {
                return Err(Error::user(
                    "Received server 101 Switching Protocols without a pending Upgrade proposal",
                ));
            }
        }
        if let Some(Annotation::SwitchConnect) = annotation {
            if !self.proposals.contains(Switch::Connect) {
                return Err(Error::user(
                    "Received server 2xx CONNECT response without a pending proposal",
                ));
            }
        }
        // A final response settles any switch proposals it did not accept.
        let is_switch = matches!(
            annotation,
            Some(Annotation::SwitchUpgrade) | Some(Annotation::SwitchConnect)
        );
        if role == Role::Server && kind == EventKind::Response && !is_switch {
            self.proposals.clear();
        }

        self.fire(role, kind, annotation)?;
        if kind == EventKind::Request {
            debug_assert_eq!(role, Role::Client);
            let server = self.state(Role::Server);
            if server == State::Idle {
                self.set_state(Role::Server, State::SendResponse);
            } else {
                return Err(illegal(Role::Server, server, kind));
            }
        }
        self.couple();
        Ok(())
    }

    fn fire(
        &mut self,
        role: Role,
        kind: EventKind,
        annotation: Option<Annotation>,
    ) -> Result<(), Error> {
        use EventKind::*;
        use State::*;

        let state = self.state(role);
        let next = match (role, state, kind) {
            (Role::Client, Idle, Request) => SendBody,
            (Role::Client, Idle, ConnectionClosed) => Closed,

            // A server may answer from Idle; this is what lets it send a 400
            // for a request that never made it through the parser.
            (Role::Server, Idle, ConnectionClosed) => Closed,
            (Role::Server, Idle, Response) | (Role::Server, SendResponse, Response) => {
                match annotation {
                    Some(Annotation::SwitchConnect) => SwitchedProtocol,
                    Some(Annotation::ResponseWithoutBody) => Done,
                    _ => SendBody,
                }
            }
            (Role::Server, SendResponse, InformationalResponse) => match annotation {
                Some(Annotation::SwitchUpgrade) => SwitchedProtocol,
                _ => SendResponse,
            },

            (_, SendBody, Data) => SendBody,
            (_, SendBody, EndOfMessage) => Done,
            (_, Done, ConnectionClosed)
            | (_, MustClose, ConnectionClosed)
            | (_, Closed, ConnectionClosed) => Closed,

            _ => return Err(illegal(role, state, kind)),
        };
        if next != state {
            debug!("{:?} {:?} -> {:?} on {:?}", role, state, next, kind);
        }
        self.set_state(role, next);
        Ok(())
    }

    /// Apply the coupling rules between the machines until a fixed point.
    fn couple(&mut self) {
        loop {
            let start = (self.client, self.server);

            // A client that finished a switch-proposing request is not
            // plain Done: the response decides what it becomes. This
            // outranks the keep-alive rule below; if the proposal is denied
            // the client drops back to Done and the other rules catch up.
            if self.proposals.any() && self.client == State::Done {
                self.client = State::MightSwitchProtocol;
            }
            if !self.proposals.any() && self.client == State::MightSwitchProtocol {
                self.client = State::Done;
            }

            if !self.keep_alive {
                if self.client == State::Done {
                    self.client = State::MustClose;
                }
                if self.server == State::Done {
                    self.server = State::MustClose;
                }
            }

            match (self.client, self.server) {
                (State::MightSwitchProtocol, State::SwitchedProtocol) => {
                    self.client = State::SwitchedProtocol;
                }
                (State::Closed, State::Done) | (State::Closed, State::Idle) => {
                    self.server = State::MustClose;
                }
                (State::Done, State::Closed) | (State::Idle, State::Closed) => {
                    self.client = State::MustClose;
                }
                // A server that answered a request it could not read has no
                // cycle to come back to.
                (State::Error, State::Done) => {
                    self.server = State::MustClose;
                }
                _ => {}
            }

            if (self.client, self.server) == start {
                return;
            }
        }
    }

    /// Both sides finished a cycle and the connection can be reused: back to
    /// Idle. Keep-alive and switch sub-states survive the reset.
    pub fn start_next_cycle(&mut self) -> Result<(), Error> {
        if (self.client, self.server) != (State::Done, State::Done) {
            return Err(Error::user(format!(
                "not in a reusable state: client {:?}, server {:?}",
                self.client, self.server
            )));
        }
        // Done/Done is unreachable with keep-alive off or a proposal open.
        debug_assert!(self.keep_alive);
        debug_assert!(!self.proposals.any());
        self.client = State::Idle;
        self.server = State::Idle;
        debug!("connection reset for next cycle");
        Ok(())
    }
}

fn illegal(role: Role, state: State, kind: EventKind) -> Error {
    Error::user(format!(
        "can't handle event type {:?} when role={:?} and state={:?}",
        kind, role, state
    ))
}
