use serde::{Deserialize, Serialize};
use std::io;

use crate::bully::types::NodeId;

#[derive(Debug)]
pub enum BullyError {
    /// Peer or service could not be reached (refused, DNS, reset...)
    NetworkUnreachable(String),
    /// A bounded wait expired
    Timeout(String),
    /// No settled leader, the cluster is electing
    NoLeaderAvailable,
    /// This node is a follower; the request belongs to the given leader
    NotLeader(NodeId),
    /// The seat was already booked by someone else
    SeatConflict(String),
    UnknownSeat(String),
    UnknownNode(NodeId),
    /// A payload that does not match the expected schema
    MalformedMessage(String),
    InvalidRequest(String),
    InvalidConfig(String),
    StorageError(String),
    IoError(io::Error),
    SerializationError(String),
}

impl BullyError {
    /// Errors a caller may retry later without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BullyError::NetworkUnreachable(_)
                | BullyError::Timeout(_)
                | BullyError::NoLeaderAvailable
                | BullyError::NotLeader(_)
        )
    }

    /// Stable machine readable name used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BullyError::NetworkUnreachable(_) => "NetworkUnreachable",
            BullyError::Timeout(_) => "Timeout",
            BullyError::NoLeaderAvailable => "NoLeaderAvailable",
            BullyError::NotLeader(_) => "NotLeader",
            BullyError::SeatConflict(_) => "SeatConflict",
            BullyError::UnknownSeat(_) => "UnknownSeat",
            BullyError::UnknownNode(_) => "UnknownNode",
            BullyError::MalformedMessage(_) => "MalformedMessage",
            BullyError::InvalidRequest(_) => "InvalidRequest",
            BullyError::InvalidConfig(_) => "InvalidConfig",
            BullyError::StorageError(_) => "StorageError",
            BullyError::IoError(_) => "IoError",
            BullyError::SerializationError(_) => "SerializationError",
        }
    }
}

impl std::fmt::Display for BullyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BullyError::NetworkUnreachable(msg) => write!(f, "Network unreachable: {}", msg),
            BullyError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            BullyError::NoLeaderAvailable => write!(f, "No leader available, election in progress"),
            BullyError::NotLeader(leader) => write!(f, "Not the leader, current leader is node {}", leader),
            BullyError::SeatConflict(seat) => write!(f, "Seat {} is already booked", seat),
            BullyError::UnknownSeat(seat) => write!(f, "Unknown seat: {}", seat),
            BullyError::UnknownNode(id) => write!(f, "Unknown node: {}", id),
            BullyError::MalformedMessage(msg) => write!(f, "Malformed message: {}", msg),
            BullyError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            BullyError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            BullyError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            BullyError::IoError(err) => write!(f, "IO error: {}", err),
            BullyError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for BullyError {}

impl From<io::Error> for BullyError {
    fn from(err: io::Error) -> Self {
        BullyError::IoError(err)
    }
}

impl From<bincode::Error> for BullyError {
    fn from(err: bincode::Error) -> Self {
        BullyError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for BullyError {
    fn from(err: serde_json::Error) -> Self {
        BullyError::MalformedMessage(err.to_string())
    }
}

impl From<reqwest::Error> for BullyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BullyError::Timeout(err.to_string())
        } else if err.is_decode() {
            BullyError::MalformedMessage(err.to_string())
        } else {
            BullyError::NetworkUnreachable(err.to_string())
        }
    }
}

impl From<actix::MailboxError> for BullyError {
    fn from(err: actix::MailboxError) -> Self {
        match err {
            actix::MailboxError::Timeout => BullyError::Timeout("actor mailbox".to_string()),
            actix::MailboxError::Closed => {
                BullyError::NetworkUnreachable("actor mailbox closed".to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BullyError>;

/// Error body of every non-2xx HTTP answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&BullyError> for ErrorBody {
    fn from(err: &BullyError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl ErrorBody {
    /// Rebuild the remote error; `subject` names the seat or resource asked for
    pub fn into_error(self, subject: &str) -> BullyError {
        match self.error.as_str() {
            "SeatConflict" => BullyError::SeatConflict(subject.to_string()),
            "UnknownSeat" => BullyError::UnknownSeat(subject.to_string()),
            // a forwarded request is never forwarded twice
            "NoLeaderAvailable" | "NotLeader" => BullyError::NoLeaderAvailable,
            "MalformedMessage" => BullyError::MalformedMessage(self.message),
            "InvalidRequest" => BullyError::InvalidRequest(self.message),
            "Timeout" => BullyError::Timeout(self.message),
            _ => BullyError::NetworkUnreachable(self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(BullyError::NoLeaderAvailable.is_retryable());
        assert!(BullyError::Timeout("ping".into()).is_retryable());
        assert!(!BullyError::SeatConflict("A2".into()).is_retryable());
        assert!(!BullyError::MalformedMessage("bad".into()).is_retryable());
    }

    #[test]
    fn test_error_body_round_trip_keeps_kind() {
        let body = ErrorBody::from(&BullyError::SeatConflict("B4".into()));
        assert_eq!(body.error, "SeatConflict");
        assert!(!body.retryable);
        assert!(matches!(body.into_error("B4"), BullyError::SeatConflict(s) if s == "B4"));

        let not_leader = ErrorBody::from(&BullyError::NotLeader(3));
        assert!(matches!(not_leader.into_error("A1"), BullyError::NoLeaderAvailable));
    }

    #[test]
    fn test_json_errors_become_malformed() {
        let err: BullyError = serde_json::from_str::<u64>("{").unwrap_err().into();
        assert_eq!(err.kind(), "MalformedMessage");
    }
}
