//! Session context: who this peer is, whether it is the authority, and the
//! synchronized clock.
//!
//! Deciding which peer becomes authority is the job of the external session
//! layer. The core only ever reads the result, the authority's [`PeerId`]
//! and the local [`Role`] derived from it, from a [`SessionContext`] handed
//! to it at construction time.

use std::cell::Cell;
use std::fmt;
use std::ops::Add;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Identifies a peer in the session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(u32);

impl PeerId {
    /// Creates a peer id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer:{}", self.0)
    }
}

/// Role of the local peer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The single peer allowed to originate state-changing decisions
    Authority,
    /// Applies what the authority broadcasts, never decides
    Replica,
}

/// Timestamp on the synchronized session clock, in seconds.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameTime(f64);

impl GameTime {
    /// Session start.
    pub const ZERO: Self = Self(0.0);

    /// Creates a timestamp.
    #[must_use]
    pub const fn from_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    /// Returns the timestamp in seconds.
    #[must_use]
    pub const fn as_seconds(self) -> f64 {
        self.0
    }
}

impl Add<f64> for GameTime {
    type Output = Self;

    fn add(self, seconds: f64) -> Self {
        Self(self.0 + seconds)
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

/// Synchronized clock supplied by the session layer.
pub trait Clock {
    /// Current session time.
    fn now(&self) -> GameTime;
}

/// Clock advanced by hand. Used by tests and the harness, which step time in
/// fixed increments.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<GameTime>,
}

impl ManualClock {
    /// Creates a clock at [`GameTime::ZERO`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    /// Jumps to an absolute time.
    pub fn set(&self, time: GameTime) {
        self.now.set(time);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> GameTime {
        self.now.get()
    }
}

/// Local peer identity, the session's authority, and the clock.
#[derive(Clone)]
pub struct SessionContext {
    local: PeerId,
    authority: PeerId,
    role: Role,
    clock: Rc<dyn Clock>,
}

impl SessionContext {
    /// Creates a session context. The local peer is the authority exactly
    /// when `local == authority`.
    #[must_use]
    pub fn new(local: PeerId, authority: PeerId, clock: Rc<dyn Clock>) -> Self {
        let role = if local == authority {
            Role::Authority
        } else {
            Role::Replica
        };
        Self {
            local,
            authority,
            role,
            clock,
        }
    }

    /// This peer's id.
    #[must_use]
    pub const fn local_peer(&self) -> PeerId {
        self.local
    }

    /// The one peer whose broadcasts this peer accepts.
    #[must_use]
    pub const fn authority(&self) -> PeerId {
        self.authority
    }

    /// This peer's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns `true` on the authority peer.
    #[must_use]
    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }

    /// Current synchronized time.
    #[must_use]
    pub fn now(&self) -> GameTime {
        self.clock.now()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("local", &self.local)
            .field("authority", &self.authority)
            .field("role", &self.role)
            .field("now", &self.clock.now())
            .finish()
    }
}
