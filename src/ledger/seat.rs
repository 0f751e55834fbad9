use serde::{Deserialize, Serialize};

use crate::bully::types::NodeId;
use crate::util::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Booked,
}

/// A seat of the grid. Booked iff both `customer_name` and
/// `booked_by_node_id` are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: u32,
    /// Row letter + column, e.g. "A2"
    pub seat_number: String,
    pub status: SeatStatus,
    pub customer_name: Option<String>,
    pub booked_by_node_id: Option<NodeId>,
    /// Commit time of the booking, orders conflicting bookings of one seat
    #[serde(default)]
    pub booked_at: Option<Timestamp>,
}

impl Seat {
    pub fn available(id: u32, seat_number: impl Into<String>) -> Self {
        Self {
            id,
            seat_number: seat_number.into(),
            status: SeatStatus::Available,
            customer_name: None,
            booked_by_node_id: None,
            booked_at: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }

    pub fn is_booked(&self) -> bool {
        self.status == SeatStatus::Booked
    }

    pub(crate) fn mark_booked(&mut self, customer_name: String, node_id: NodeId, at: Timestamp) {
        self.status = SeatStatus::Booked;
        self.customer_name = Some(customer_name);
        self.booked_by_node_id = Some(node_id);
        self.booked_at = Some(at);
    }

    /// Same customer booked by the same node
    pub fn same_booking(&self, other: &Seat) -> bool {
        self.status == other.status
            && self.customer_name == other.customer_name
            && self.booked_by_node_id == other.booked_by_node_id
    }

    /// Whether this booking was committed before `other`. Unknown times sort
    /// last, equal times go to the lower node id.
    pub fn booked_before(&self, other: &Seat) -> bool {
        let key = |s: &Seat| (s.booked_at.is_none(), s.booked_at, s.booked_by_node_id);
        key(self) < key(other)
    }

    /// Status, customer and booking node agree
    pub fn is_consistent(&self) -> bool {
        match self.status {
            SeatStatus::Booked => self.customer_name.is_some() && self.booked_by_node_id.is_some(),
            SeatStatus::Available => {
                self.customer_name.is_none() && self.booked_by_node_id.is_none()
            }
        }
    }
}

/// Build a rows x columns grid: A1..A<columns>, B1.. and so on
pub fn seat_grid(rows: u32, columns: u32) -> Vec<Seat> {
    let mut seats = Vec::with_capacity(rows.min(26) as usize * columns as usize);
    for (row_index, row) in ('A'..='Z').take(rows as usize).enumerate() {
        for column in 1..=columns {
            let id = row_index as u32 * columns + column;
            seats.push(Seat::available(id, format!("{}{}", row, column)));
        }
    }
    seats
}

/// Canonical form of a seat number typed by a user ("  a2 " -> "A2")
pub fn normalize_seat_number(raw: &str) -> String {
    raw.trim().to_uppercase()
}
