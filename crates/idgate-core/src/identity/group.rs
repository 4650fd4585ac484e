//! Group history: the timestamped command log consumed by freshness checks
//!
//! Membership consensus is out of scope; commands are only read for their
//! times and their senders.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::types::{Identifier, Timestamp};

/// Kind of a group-management command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupCommandKind {
    Invite,
    Join,
    Quit,
    Reset,
    Resign,
    Expel,
}

impl fmt::Display for GroupCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupCommandKind::Invite => "invite",
            GroupCommandKind::Join => "join",
            GroupCommandKind::Quit => "quit",
            GroupCommandKind::Reset => "reset",
            GroupCommandKind::Resign => "resign",
            GroupCommandKind::Expel => "expel",
        };
        write!(f, "{}", name)
    }
}

/// One entry of a group's command history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCommand {
    pub kind: GroupCommandKind,
    pub group: Identifier,
    pub sender: Identifier,
    pub members: Vec<Identifier>,
    pub time: Option<Timestamp>,
}

impl GroupCommand {
    pub fn new(
        kind: GroupCommandKind,
        group: Identifier,
        sender: Identifier,
        time: Option<Timestamp>,
    ) -> Self {
        Self {
            kind,
            group,
            sender,
            members: Vec::new(),
            time,
        }
    }

    /// Members named by an invite/expel/reset command
    pub fn with_members(mut self, members: Vec<Identifier>) -> Self {
        self.members = members;
        self
    }
}

/// Earliest time across a group history, skipping entries without a time
pub fn earliest_history_time(history: &[GroupCommand]) -> Option<Timestamp> {
    history.iter().filter_map(|cmd| cmd.time).min()
}
