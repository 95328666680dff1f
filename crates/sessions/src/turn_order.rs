//! Circular turn order with a cursor on the current turn holder.

use crate::{Error, Result};

/// Ordered, circular, never-empty sequence of participants.
///
/// The first participant is the head. `next`/`previous` wrap around the
/// ends. The cursor always points at a current member.
#[derive(Debug, Clone)]
pub struct TurnOrder<P> {
    members: Vec<P>,
    cursor: usize,
}

impl<P: PartialEq> TurnOrder<P> {
    /// Build an order from `members`, head first. Fails if empty.
    pub fn new(members: impl IntoIterator<Item = P>) -> Result<Self> {
        let members: Vec<P> = members.into_iter().collect();
        if members.is_empty() {
            return Err(Error::EmptyTurnOrder);
        }
        Ok(Self { members, cursor: 0 })
    }

    pub fn head(&self) -> &P {
        &self.members[0]
    }

    /// The participant whose turn it is.
    pub fn current(&self) -> &P {
        &self.members[self.cursor]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &P> {
        self.members.iter()
    }

    pub fn contains(&self, participant: &P) -> bool {
        self.position(participant).is_some()
    }

    /// Participant after `participant`, wrapping to the head.
    pub fn next(&self, participant: &P) -> Option<&P> {
        self.position(participant)
            .map(|idx| &self.members[self.wrap_next(idx)])
    }

    /// Participant before `participant`, wrapping to the tail.
    pub fn previous(&self, participant: &P) -> Option<&P> {
        self.position(participant)
            .map(|idx| &self.members[self.wrap_previous(idx)])
    }

    /// Move the cursor back to the head.
    pub fn reset_to_head(&mut self) -> &P {
        self.cursor = 0;
        self.current()
    }

    /// Move the cursor exactly one step forward and return the new holder.
    pub fn advance(&mut self) -> &P {
        self.cursor = self.wrap_next(self.cursor);
        self.current()
    }

    /// Remove `participant`. If it holds the cursor, the cursor moves to
    /// its successor first. The last remaining participant cannot be removed.
    pub fn remove(&mut self, participant: &P) -> Result<P> {
        let idx = self.position(participant).ok_or(Error::NotAParticipant)?;
        if self.members.len() == 1 {
            return Err(Error::LastParticipant);
        }
        if idx == self.cursor {
            self.cursor = self.wrap_next(self.cursor);
        }
        let removed = self.members.remove(idx);
        if idx < self.cursor {
            self.cursor -= 1;
        }
        Ok(removed)
    }

    fn position(&self, participant: &P) -> Option<usize> {
        self.members.iter().position(|m| m == participant)
    }

    fn wrap_next(&self, idx: usize) -> usize {
        (idx + 1) % self.members.len()
    }

    fn wrap_previous(&self, idx: usize) -> usize {
        (idx + self.members.len() - 1) % self.members.len()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn order(n: u32) -> TurnOrder<u32> {
        TurnOrder::new(0..n).unwrap()
    }

    #[test]
    fn empty_order_is_rejected() {
        assert!(matches!(
            TurnOrder::<u32>::new(Vec::new()),
            Err(Error::EmptyTurnOrder)
        ));
    }

    #[test]
    fn next_n_times_returns_to_start() {
        for n in 1..=6 {
            let order = order(n);
            for start in 0..n {
                let mut p = start;
                for _ in 0..n {
                    p = *order.next(&p).unwrap();
                }
                assert_eq!(p, start, "n={n}");
            }
        }
    }

    #[test]
    fn next_of_previous_is_identity() {
        for n in 1..=6 {
            let order = order(n);
            for p in order.iter() {
                let prev = order.previous(p).unwrap();
                assert_eq!(order.next(prev), Some(p));
                assert_eq!(order.previous(order.next(p).unwrap()), Some(p));
            }
        }
    }

    #[test]
    fn unknown_participant_has_no_neighbours() {
        let order = order(3);
        assert_eq!(order.next(&9), None);
        assert_eq!(order.previous(&9), None);
    }

    #[test]
    fn advance_moves_one_step_and_wraps() {
        let mut order = TurnOrder::new(["a", "b", "c"]).unwrap();
        assert_eq!(*order.current(), "a");
        assert_eq!(*order.advance(), "b");
        assert_eq!(*order.advance(), "c");
        assert_eq!(*order.advance(), "a");
        order.advance();
        assert_eq!(*order.reset_to_head(), "a");
    }

    #[test]
    fn removing_cursor_target_moves_cursor_to_successor() {
        let mut order = TurnOrder::new(["a", "b", "c"]).unwrap();
        order.advance();
        assert_eq!(order.remove(&"b").unwrap(), "b");
        assert_eq!(*order.current(), "c");

        // Removing the tail while it holds the cursor wraps to the head.
        assert_eq!(order.remove(&"c").unwrap(), "c");
        assert_eq!(*order.current(), "a");
    }

    #[test]
    fn removing_before_cursor_keeps_holder() {
        let mut order = TurnOrder::new(["a", "b", "c"]).unwrap();
        order.advance();
        order.advance();
        order.remove(&"a").unwrap();
        assert_eq!(*order.current(), "c");
        assert_eq!(*order.head(), "b");
    }

    #[test]
    fn last_participant_cannot_be_removed() {
        let mut order = TurnOrder::new(["solo"]).unwrap();
        assert!(matches!(order.remove(&"solo"), Err(Error::LastParticipant)));
        assert!(matches!(order.remove(&"ghost"), Err(Error::NotAParticipant)));
        assert_eq!(order.len(), 1);
    }
}
