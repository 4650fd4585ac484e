//! Session handshake classification
//!
//! A handshake command carries a title and a session key. The state is a pure
//! function of those two fields, so the session layer can test every
//! transition without a network.
//!
//! ```text
//! C -> S  "Hello world!" (no key)      Start
//! S -> C  "DIM?"         (new key)     Again
//! C -> S  "Hello world!" (with key)    Restart
//! S -> C  "DIM!"                       Success
//! ```

use core::fmt;
use serde::{Deserialize, Serialize};

/// Title sent by the station when the handshake is accepted
pub const HANDSHAKE_ACCEPTED: &str = "DIM!";

/// Title sent by the station to ask for another handshake with a new key
pub const HANDSHAKE_AGAIN: &str = "DIM?";

/// Title sent by clients when starting or restarting a handshake
pub const HANDSHAKE_HELLO: &str = "Hello world!";

// ----------------------------------------------------------------------------
// Handshake State
// ----------------------------------------------------------------------------

/// Handshake state derived from a handshake command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandshakeState {
    /// No handshake attempted yet
    Init,
    /// C -> S, without session key (or session expired)
    Start,
    /// S -> C, with new session key
    Again,
    /// C -> S, with new session key
    Restart,
    /// S -> C, handshake accepted
    Success,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Init => write!(f, "HandshakeInit"),
            HandshakeState::Start => write!(f, "HandshakeStart"),
            HandshakeState::Again => write!(f, "HandshakeAgain"),
            HandshakeState::Restart => write!(f, "HandshakeRestart"),
            HandshakeState::Success => write!(f, "HandshakeSuccess"),
        }
    }
}

/// Classify a handshake signal
pub fn classify(title: &str, session_key: &str) -> HandshakeState {
    if title.is_empty() {
        return HandshakeState::Init;
    }
    if title == HANDSHAKE_ACCEPTED {
        return HandshakeState::Success;
    }
    if title == HANDSHAKE_AGAIN {
        return HandshakeState::Again;
    }
    if session_key.is_empty() {
        HandshakeState::Start
    } else {
        HandshakeState::Restart
    }
}

// ----------------------------------------------------------------------------
// Handshake Command
// ----------------------------------------------------------------------------

/// Handshake command content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeCommand {
    pub title: String,
    pub session_key: String,
}

impl HandshakeCommand {
    pub fn new<T: Into<String>, K: Into<String>>(title: T, session_key: K) -> Self {
        Self {
            title: title.into(),
            session_key: session_key.into(),
        }
    }

    /// Client hello without a session key
    pub fn start() -> Self {
        Self::new(HANDSHAKE_HELLO, "")
    }

    /// Client hello carrying the key the station handed out
    pub fn restart<K: Into<String>>(session_key: K) -> Self {
        Self::new(HANDSHAKE_HELLO, session_key)
    }

    /// Station reply asking the client to handshake again with `session_key`
    pub fn again<K: Into<String>>(session_key: K) -> Self {
        Self::new(HANDSHAKE_AGAIN, session_key)
    }

    /// Station reply accepting the session
    pub fn success<K: Into<String>>(session_key: K) -> Self {
        Self::new(HANDSHAKE_ACCEPTED, session_key)
    }

    pub fn state(&self) -> HandshakeState {
        classify(&self.title, &self.session_key)
    }
}

// ----------------------------------------------------------------------------
// Response Planning
// ----------------------------------------------------------------------------

/// What the client session should do with a station's handshake reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Send a (re)start handshake carrying this key
    SendHandshake { session_key: String },
    /// Store this key and switch to the authenticated state
    AcceptSession { session_key: String },
    /// Erase the current key and handshake from scratch
    ResetSession,
    /// Not a station reply (a client hello reached a client)
    Unexpected,
}

/// Plan the reaction to a station reply given the current session key
pub fn plan_response(command: &HandshakeCommand, current_key: Option<&str>) -> HandshakeAction {
    let new_key = command.session_key.as_str();
    let same_or_none = match current_key {
        None | Some("") => true,
        Some(old_key) => old_key == new_key,
    };
    match command.state() {
        HandshakeState::Again if same_or_none => HandshakeAction::SendHandshake {
            session_key: new_key.to_string(),
        },
        HandshakeState::Success if same_or_none => HandshakeAction::AcceptSession {
            session_key: new_key.to_string(),
        },
        // connection changed under us, start over
        HandshakeState::Again | HandshakeState::Success => HandshakeAction::ResetSession,
        HandshakeState::Init | HandshakeState::Start | HandshakeState::Restart => {
            HandshakeAction::Unexpected
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
