//! Bounded membership list of a room.
//!
//! A member's *slot* is its index in the roster, always the dense range
//! `0..len`. Removing a member shifts everyone after it down by one. A
//! member's [`MemberId`] never changes and is never handed out twice, so
//! ids stay valid across other members' departures while slots do not.

use playpool_protocol::MemberId;

/// One occupied seat.
#[derive(Debug)]
pub(crate) struct Seat<T> {
    pub(crate) id: MemberId,
    pub(crate) score: u64,
    pub(crate) occupant: T,
}

/// Capacity-bounded, insertion-ordered members.
#[derive(Debug)]
pub(crate) struct Roster<T> {
    capacity: usize,
    next_id: u64,
    seats: Vec<Seat<T>>,
}

impl<T> Roster<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: 0,
            seats: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.seats.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Seats a new member if there is room.
    ///
    /// `occupant` is only called on success, with the freshly allocated id.
    /// A full roster returns `None` and is left untouched, id counter
    /// included.
    pub(crate) fn admit(
        &mut self,
        occupant: impl FnOnce(MemberId) -> T,
    ) -> Option<MemberId> {
        if self.seats.len() >= self.capacity {
            return None;
        }
        let id = MemberId(self.next_id);
        self.next_id += 1;
        self.seats.push(Seat {
            id,
            score: 0,
            occupant: occupant(id),
        });
        Some(id)
    }

    /// Removes a member and compacts the slots behind it.
    pub(crate) fn remove(&mut self, id: MemberId) -> Option<Seat<T>> {
        let slot = self.slot_of(id)?;
        Some(self.seats.remove(slot))
    }

    /// Adds one point to `id`'s score and returns the new total.
    pub(crate) fn credit(&mut self, id: MemberId) -> Option<u64> {
        let seat = self.seats.iter_mut().find(|seat| seat.id == id)?;
        seat.score += 1;
        Some(seat.score)
    }

    pub(crate) fn contains(&self, id: MemberId) -> bool {
        self.slot_of(id).is_some()
    }

    pub(crate) fn slot_of(&self, id: MemberId) -> Option<usize> {
        self.seats.iter().position(|seat| seat.id == id)
    }

    /// Seats in slot order.
    pub(crate) fn seats(&self) -> impl Iterator<Item = &Seat<T>> {
        self.seats.iter()
    }

    /// Empties the roster, yielding every seat in slot order.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Seat<T>> + '_ {
        self.seats.drain(..)
    }
}
