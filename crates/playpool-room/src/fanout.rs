//! Who receives which event.

use playpool_protocol::{Envelope, EventKind, MemberId};

/// The delivery decision for one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// Nobody hears about it.
    Silent,
    /// Every current member.
    Everyone,
    /// Every current member except this one.
    AllExcept(MemberId),
}

impl Route {
    /// Picks the route for `envelope`, evaluated after any membership
    /// change it causes has been applied.
    ///
    /// - `ScoreUpdate` is a private state change.
    /// - `Left` goes to everyone who is still there.
    /// - `Joined` goes to everyone but the newcomer, so a member joining an
    ///   empty room hears nothing.
    /// - `Attack` goes to everyone but the attacker.
    pub(crate) fn for_envelope(envelope: &Envelope) -> Self {
        match envelope.kind {
            EventKind::ScoreUpdate => Self::Silent,
            EventKind::Left => Self::Everyone,
            EventKind::Joined | EventKind::Attack => Self::AllExcept(envelope.source),
        }
    }

    pub(crate) fn includes(self, member: MemberId) -> bool {
        match self {
            Self::Silent => false,
            Self::Everyone => true,
            Self::AllExcept(excluded) => member != excluded,
        }
    }
}
