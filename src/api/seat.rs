use actix_web::web::{Data, Json};
use actix_web::{get, post, HttpRequest};

use crate::app::NodeApp;
use crate::ledger::actor::{book_or_forward, ApplyReplicated, GetSeats};
use crate::ledger::{BookSeatRequest, ReplicatedBooking, Seat};
use crate::network::FORWARDED_BY_HEADER;
use crate::util::errors::BullyError;

#[get("/seat")]
pub async fn seats(app: Data<NodeApp>) -> Result<Json<Vec<Seat>>, BullyError> {
    Ok(Json(app.ledger.send(GetSeats).await?))
}

/// Book a seat. A follower hands the request to the leader once; the
/// leader answers with the committed seat.
#[post("/seat/book")]
pub async fn book(
    app: Data<NodeApp>,
    req: HttpRequest,
    body: Json<BookSeatRequest>,
) -> Result<Json<Seat>, BullyError> {
    let forwarded = req.headers().contains_key(FORWARDED_BY_HEADER);
    if forwarded {
        tracing::debug!("Booking of {} forwarded by a follower", body.seat_id);
    }

    let seat = book_or_forward(
        &app.ledger,
        &app.registry,
        app.transport.as_ref(),
        body.into_inner(),
        forwarded,
    )
    .await?;

    Ok(Json(seat))
}

/// Leader -> follower
#[post("/seat/replicate")]
pub async fn replicate(
    app: Data<NodeApp>,
    body: Json<ReplicatedBooking>,
) -> Result<Json<Seat>, BullyError> {
    let seat = app.ledger.send(ApplyReplicated(body.into_inner())).await??;
    Ok(Json(seat))
}
