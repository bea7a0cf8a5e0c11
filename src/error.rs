use std::fmt;

/// Possible errors from this crate.
///
/// Every error carries a status code hint. When the connection is a server,
/// the hint is the response status (400, 431, 501) that best matches the
/// problem, should the embedder want to answer before closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A user/usage problem, such as sending an event the state machine does
    /// not allow, or declaring a `Content-Length` the body data does not add
    /// up to. The side that sent the offending event goes to the ERROR state.
    User(String, u16),
    /// The remote peer broke the protocol: bytes that do not parse, illegal
    /// framing, or a violated invariant. The peer's side goes to the ERROR
    /// state.
    Protocol(String, u16),
}

impl Error {
    pub(crate) fn user(msg: impl Into<String>) -> Self {
        Error::User(msg.into(), 400)
    }

    pub(crate) fn user_with_status(msg: impl Into<String>, status: u16) -> Self {
        Error::User(msg.into(), status)
    }

    pub(crate) fn remote(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into(), 400)
    }

    pub(crate) fn remote_with_status(msg: impl Into<String>, status: u16) -> Self {
        Error::Protocol(msg.into(), status)
    }

    /// Errors detected while interpreting received bytes are the peer's
    /// fault, even when the detecting code is shared with the send path.
    pub(crate) fn into_remote(self) -> Self {
        match self {
            Error::User(msg, status) => Error::Protocol(msg, status),
            remote => remote,
        }
    }

    /// The status code a server could still respond with.
    pub fn status_hint(&self) -> u16 {
        match self {
            Error::User(_, status) => *status,
            Error::Protocol(_, status) => *status,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::User(v, _) => write!(f, "{}", v),
            Error::Protocol(v, _) => write!(f, "protocol violation: {}", v),
        }
    }
}

impl std::error::Error for Error {}
