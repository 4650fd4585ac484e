//! Core types for the identity gate
//!
//! This module defines the fundamental value types shared by every component:
//! timestamps and time sources, entity types, and the identifier that names
//! users, groups, stations and broadcast pseudo-identities.

use core::fmt;
use core::ops::Add;
use core::str::FromStr;
use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, other: Duration) -> Timestamp {
        let millis = u64::try_from(other.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Create a timestamp from whole seconds
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Get current wall-clock timestamp
    pub fn now() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "std")] {
                use std::time::{SystemTime, UNIX_EPOCH};
                let duration = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default();
                Self(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
            } else {
                Self(0)
            }
        }
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whether this timestamp is strictly before `other`
    pub fn is_before(&self, other: Timestamp) -> bool {
        self.0 < other.0
    }

    /// Whether this timestamp is strictly after `other`
    pub fn is_after(&self, other: Timestamp) -> bool {
        self.0 > other.0
    }

    /// Clamp a peer-supplied time so it never lies in the future of `now`
    pub fn clamp_to(self, now: Timestamp) -> Timestamp {
        if self.is_after(now) {
            now
        } else {
            self
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Source of "now" for components that compare against local time
///
/// Injected into the directory, emitter and processor so tests can drive the
/// clock deterministically.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation of [`TimeSource`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

// ----------------------------------------------------------------------------
// Entity Type
// ----------------------------------------------------------------------------

/// Kind of entity an identifier names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// Human user account
    User,
    /// Message relay station
    Station,
    /// Automated account
    Bot,
    /// Chat group
    Group,
    /// Service provider (a group of stations)
    ServiceProvider,
}

impl EntityType {
    /// User-like entities own a visa and can receive direct messages
    pub fn is_user(self) -> bool {
        matches!(self, EntityType::User | EntityType::Station | EntityType::Bot)
    }

    /// Group-like entities own a bulletin and a member list
    pub fn is_group(self) -> bool {
        matches!(self, EntityType::Group | EntityType::ServiceProvider)
    }
}

// ----------------------------------------------------------------------------
// Identifier
// ----------------------------------------------------------------------------

/// Address of the "anyone" broadcast pseudo-user
pub const ANYWHERE: &str = "anywhere";

/// Address of the "everyone" broadcast pseudo-group
pub const EVERYWHERE: &str = "everywhere";

/// Identity reference: `name@address`, tagged with its entity type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier {
    name: Option<String>,
    address: String,
    entity_type: EntityType,
}

impl Identifier {
    /// Create a new identifier
    pub fn new<A: Into<String>>(name: Option<&str>, address: A, entity_type: EntityType) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()).map(str::to_string),
            address: address.into(),
            entity_type,
        }
    }

    /// Shorthand for a user identifier
    pub fn user<A: Into<String>>(name: &str, address: A) -> Self {
        Self::new(Some(name), address, EntityType::User)
    }

    /// Shorthand for a group identifier
    pub fn group<A: Into<String>>(name: &str, address: A) -> Self {
        Self::new(Some(name), address, EntityType::Group)
    }

    /// `anyone@anywhere`
    pub fn anyone() -> Self {
        Self::new(Some("anyone"), ANYWHERE, EntityType::User)
    }

    /// `everyone@everywhere`
    pub fn everyone() -> Self {
        Self::new(Some("everyone"), EVERYWHERE, EntityType::Group)
    }

    /// Optional name (seed) part
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Address part
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Broadcast identities have no meta or documents to query
    pub fn is_broadcast(&self) -> bool {
        self.address == ANYWHERE || self.address == EVERYWHERE
    }

    pub fn is_user(&self) -> bool {
        self.entity_type.is_user()
    }

    pub fn is_group(&self) -> bool {
        self.entity_type.is_group()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}@{}", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

impl FromStr for Identifier {
    type Err = CoreError;

    /// Parse `name@address` or a bare address
    ///
    /// The entity type cannot be recovered from text alone: broadcast groups
    /// (`@everywhere`) parse as groups, everything else as users.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, address) = match s.split_once('@') {
            Some((name, address)) => (Some(name), address),
            None => (None, s),
        };
        if address.is_empty() || address.contains('@') {
            return Err(CoreError::invalid_identifier(s));
        }
        let entity_type = if address == EVERYWHERE {
            EntityType::Group
        } else {
            EntityType::User
        };
        Ok(Self::new(name, address, entity_type))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
