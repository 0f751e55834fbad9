pub mod actor;
pub mod rpc;
pub mod seat;
pub mod seat_ledger;

pub use actor::{book_or_forward, LedgerActor};
pub use rpc::{BookSeatRequest, ReplicatedBooking};
pub use seat::{Seat, SeatStatus};
pub use seat_ledger::{BookingConflict, MergeReport, SeatLedger};
