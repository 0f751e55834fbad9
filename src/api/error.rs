use actix_web::http::StatusCode;
use actix_web::{error, HttpRequest, HttpResponse, ResponseError};

use crate::util::errors::{BullyError, ErrorBody};

impl ResponseError for BullyError {
    fn status_code(&self) -> StatusCode {
        match self {
            BullyError::SeatConflict(_) => StatusCode::CONFLICT,
            BullyError::NoLeaderAvailable | BullyError::NotLeader(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            BullyError::UnknownSeat(_) | BullyError::UnknownNode(_) => StatusCode::NOT_FOUND,
            BullyError::MalformedMessage(_) | BullyError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            BullyError::NetworkUnreachable(_) => StatusCode::BAD_GATEWAY,
            BullyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::warn!("Request failed: {}", self);
        }
        HttpResponse::build(self.status_code()).json(ErrorBody::from(self))
    }
}

/// JSON bodies that do not match the schema are `MalformedMessage`
pub fn json_config() -> actix_web::web::JsonConfig {
    actix_web::web::JsonConfig::default().error_handler(|err: error::JsonPayloadError, _req: &HttpRequest| {
        tracing::warn!("Rejecting malformed body: {}", err);
        BullyError::MalformedMessage(err.to_string()).into()
    })
}

pub fn path_config() -> actix_web::web::PathConfig {
    actix_web::web::PathConfig::default().error_handler(|err: error::PathError, _req: &HttpRequest| {
        BullyError::MalformedMessage(err.to_string()).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            BullyError::SeatConflict("A2".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BullyError::NoLeaderAvailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(BullyError::UnknownNode(9).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            BullyError::Timeout("ping".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            BullyError::StorageError("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
