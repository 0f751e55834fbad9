use std::collections::HashMap;

use super::seat::{normalize_seat_number, seat_grid, Seat};
use crate::bully::types::NodeId;
use crate::util::errors::{BullyError, Result};
use crate::util::time::{now, Timestamp};

/// The seat map. Mutation goes through `book` (leader) or
/// `apply_replicated` / `merge` (followers); a booked seat is never
/// turned back into an available one.
#[derive(Debug, Clone)]
pub struct SeatLedger {
    seats: Vec<Seat>,
    index: HashMap<String, usize>,
}

impl SeatLedger {
    pub fn new(seats: Vec<Seat>) -> Self {
        let index = seats
            .iter()
            .enumerate()
            .map(|(i, s)| (s.seat_number.clone(), i))
            .collect();
        Self { seats, index }
    }

    pub fn with_grid(rows: u32, columns: u32) -> Self {
        Self::new(seat_grid(rows, columns))
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn snapshot(&self) -> Vec<Seat> {
        self.seats.clone()
    }

    pub fn get(&self, seat_number: &str) -> Option<&Seat> {
        self.index
            .get(&normalize_seat_number(seat_number))
            .map(|i| &self.seats[*i])
    }

    /// Seat exists and the customer is named; returns the seat slot
    pub fn validate(&self, seat_number: &str, customer_name: &str) -> Result<usize> {
        let number = normalize_seat_number(seat_number);
        let slot = *self
            .index
            .get(&number)
            .ok_or(BullyError::UnknownSeat(number))?;

        if customer_name.trim().is_empty() {
            return Err(BullyError::InvalidRequest(
                "customerName cannot be empty".to_string(),
            ));
        }

        Ok(slot)
    }

    pub fn check_free(&self, slot: usize) -> Result<()> {
        let seat = &self.seats[slot];
        if seat.is_booked() {
            return Err(BullyError::SeatConflict(seat.seat_number.clone()));
        }
        Ok(())
    }

    /// Validate a booking without touching the ledger; returns the seat slot
    pub fn check_bookable(&self, seat_number: &str, customer_name: &str) -> Result<usize> {
        let slot = self.validate(seat_number, customer_name)?;
        self.check_free(slot)?;
        Ok(slot)
    }

    /// Commit a slot returned by `check_bookable`
    pub fn commit(&mut self, slot: usize, customer_name: &str, node_id: NodeId, at: Timestamp) -> Seat {
        let seat = &mut self.seats[slot];
        seat.mark_booked(customer_name.trim().to_string(), node_id, at);
        seat.clone()
    }

    pub fn book(&mut self, seat_number: &str, customer_name: &str, node_id: NodeId) -> Result<Seat> {
        let slot = self.check_bookable(seat_number, customer_name)?;
        Ok(self.commit(slot, customer_name, node_id, now()))
    }

    fn slot_of(&self, seat: &Seat) -> Result<usize> {
        if !seat.is_consistent() {
            return Err(BullyError::MalformedMessage(format!(
                "inconsistent seat {}",
                seat.seat_number
            )));
        }

        self.index
            .get(&seat.seat_number)
            .copied()
            .ok_or_else(|| BullyError::UnknownSeat(seat.seat_number.clone()))
    }

    fn replace(&mut self, slot: usize, seat: &Seat) {
        let local = &mut self.seats[slot];
        *local = Seat {
            id: local.id,
            ..seat.clone()
        };
    }

    /// Apply a seat committed by the leader. Returns whether anything changed.
    /// A seat booked here for someone else is never overwritten.
    pub fn apply_replicated(&mut self, seat: &Seat) -> Result<bool> {
        let slot = self.slot_of(seat)?;
        let local = &self.seats[slot];

        if !seat.is_booked() || local.same_booking(seat) {
            return Ok(false);
        }
        if local.is_booked() {
            return Err(BullyError::SeatConflict(seat.seat_number.clone()));
        }

        self.replace(slot, seat);
        Ok(true)
    }

    /// Merge the seat map of another node. Available seats never unbook a
    /// local booking; two different bookings of one seat keep the earlier.
    pub fn merge(&mut self, seats: &[Seat]) -> MergeReport {
        let mut report = MergeReport::default();

        for seat in seats {
            match self.apply_replicated(seat) {
                Ok(true) => report.changed += 1,
                Ok(false) => {}
                Err(BullyError::SeatConflict(_)) => {
                    let Ok(slot) = self.slot_of(seat) else {
                        continue;
                    };
                    let local = self.seats[slot].clone();

                    if seat.booked_before(&local) {
                        self.replace(slot, seat);
                        report.changed += 1;
                        report.conflicts.push(BookingConflict {
                            kept: seat.clone(),
                            dropped: local,
                        });
                    } else {
                        report.conflicts.push(BookingConflict {
                            kept: local,
                            dropped: seat.clone(),
                        });
                    }
                }
                Err(e) => tracing::warn!("Skipping seat during merge: {}", e),
            }
        }

        report
    }
}

/// Two different bookings of one seat met during a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConflict {
    pub kept: Seat,
    pub dropped: Seat,
}

impl BookingConflict {
    /// Audit line for the transaction log
    pub fn describe(&self) -> String {
        format!(
            "Seat {} double booked: kept {} (Node {}), dropped {} (Node {})",
            self.kept.seat_number,
            self.kept.customer_name.as_deref().unwrap_or("?"),
            self.kept.booked_by_node_id.unwrap_or_default(),
            self.dropped.customer_name.as_deref().unwrap_or("?"),
            self.dropped.booked_by_node_id.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Default)]
pub struct MergeReport {
    /// Seats that changed locally
    pub changed: usize,
    pub conflicts: Vec<BookingConflict>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::seat::SeatStatus;

    #[test]
    fn test_book_available_seat() {
        let mut ledger = SeatLedger::with_grid(7, 10);
        let seat = ledger.book("a2", " Jane Doe ", 3).unwrap();

        assert_eq!(seat.seat_number, "A2");
        assert_eq!(seat.status, SeatStatus::Booked);
        assert_eq!(seat.customer_name.as_deref(), Some("Jane Doe"));
        assert_eq!(seat.booked_by_node_id, Some(3));
        assert!(ledger.get("A2").map(|s| s.is_consistent()).unwrap_or(false));
    }

    #[test]
    fn test_second_booking_conflicts() {
        let mut ledger = SeatLedger::with_grid(7, 10);
        ledger.book("B4", "Lisa Ray", 3).unwrap();

        let err = ledger.book("B4", "John Smith", 3).unwrap_err();
        assert!(matches!(err, BullyError::SeatConflict(ref s) if s == "B4"));
        assert_eq!(
            ledger.get("B4").and_then(|s| s.customer_name.clone()).as_deref(),
            Some("Lisa Ray")
        );
    }

    #[test]
    fn test_invalid_bookings() {
        let mut ledger = SeatLedger::with_grid(2, 2);
        assert!(matches!(ledger.book("Z9", "Jane", 1), Err(BullyError::UnknownSeat(_))));
        assert!(matches!(ledger.book("A1", "  ", 1), Err(BullyError::InvalidRequest(_))));
        assert!(ledger.seats().iter().all(|s| s.is_available()));
    }

    #[test]
    fn test_merge_never_unbooks() {
        let mut follower = SeatLedger::with_grid(2, 2);
        follower.book("A1", "Alice Johnson", 2).unwrap();

        let mut leader = SeatLedger::with_grid(2, 2);
        leader.book("B2", "John Smith", 3).unwrap();

        // leader snapshot has A1 available: must not revert it
        let report = follower.merge(&leader.snapshot());
        assert_eq!(report.changed, 1);
        assert!(report.conflicts.is_empty());
        assert!(follower.get("A1").map(|s| s.is_booked()).unwrap_or(false));
        assert!(follower.get("B2").map(|s| s.is_booked()).unwrap_or(false));
    }

    #[test]
    fn test_inconsistent_replica_rejected() {
        let mut ledger = SeatLedger::with_grid(1, 1);
        let mut seat = Seat::available(1, "A1");
        seat.status = SeatStatus::Booked;

        assert!(matches!(
            ledger.apply_replicated(&seat),
            Err(BullyError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_replicated_booking_never_overwrites() {
        let mut follower = SeatLedger::with_grid(2, 2);
        let mut alice = Seat::available(1, "A1");
        alice.mark_booked("Alice".to_string(), 2, now());
        assert!(follower.apply_replicated(&alice).unwrap());

        // the same booking again is a no-op
        assert!(!follower.apply_replicated(&alice).unwrap());

        let mut mallory = Seat::available(1, "A1");
        mallory.mark_booked("Mallory".to_string(), 3, now());
        assert!(matches!(
            follower.apply_replicated(&mallory),
            Err(BullyError::SeatConflict(ref s)) if s == "A1"
        ));
        assert_eq!(
            follower.get("A1").and_then(|s| s.customer_name.clone()).as_deref(),
            Some("Alice")
        );
    }

    #[test]
    fn test_merge_keeps_earlier_booking() {
        let at = now();
        let mut bob = Seat::available(9, "B4");
        bob.mark_booked("Bob".to_string(), 2, at);
        let mut alice = Seat::available(9, "B4");
        alice.mark_booked("Alice".to_string(), 3, at + chrono::Duration::seconds(5));

        // node 2 sold B4 first, node 3 later: node 2 keeps Bob
        let mut node2 = SeatLedger::with_grid(2, 5);
        node2.apply_replicated(&bob).unwrap();
        let report = node2.merge(&[alice.clone()]);
        assert_eq!(report.changed, 0);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].kept.customer_name.as_deref(), Some("Bob"));
        assert_eq!(
            report.conflicts[0].describe(),
            "Seat B4 double booked: kept Bob (Node 2), dropped Alice (Node 3)"
        );
        assert_eq!(
            node2.get("B4").and_then(|s| s.customer_name.clone()).as_deref(),
            Some("Bob")
        );

        // node 3 merging the other way converges on Bob as well
        let mut node3 = SeatLedger::with_grid(2, 5);
        node3.apply_replicated(&alice).unwrap();
        let report = node3.merge(&[bob]);
        assert_eq!(report.changed, 1);
        assert_eq!(report.conflicts[0].dropped.customer_name.as_deref(), Some("Alice"));
        assert_eq!(
            node3.get("B4").and_then(|s| s.booked_by_node_id),
            Some(2)
        );
    }
}
