use serde::{Deserialize, Serialize};

use super::seat::Seat;
use crate::transactions::Transaction;

/// Body of `POST /seat/book`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookSeatRequest {
    /// Seat number such as "A2"
    pub seat_id: String,
    pub customer_name: String,
}

/// A committed booking pushed by the leader to its followers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplicatedBooking {
    pub seat: Seat,
    pub transaction: Transaction,
}
