use actix_web::web::{Data, Json, Path};
use actix_web::{get, post};

use crate::app::NodeApp;
use crate::bully::actor::{GetElectionState, GetPing, HandleElection, HandleVictory};
use crate::bully::rpc::{ElectionReply, ElectionRequest, PingResponse, VictoryAck};
use crate::bully::{ElectionEvent, ElectionStateInfo, NodeId};
use crate::util::errors::BullyError;

#[get("/election/events")]
pub async fn events(app: Data<NodeApp>) -> Json<Vec<ElectionEvent>> {
    Json(app.history.snapshot())
}

#[get("/election/ping")]
pub async fn ping(app: Data<NodeApp>) -> Result<Json<PingResponse>, BullyError> {
    Ok(Json(app.bully.send(GetPing).await?))
}

/// ELECTION
#[post("/election/election")]
pub async fn election(
    app: Data<NodeApp>,
    body: Json<ElectionRequest>,
) -> Result<Json<ElectionReply>, BullyError> {
    let reply = app.bully.send(HandleElection(body.into_inner())).await??;
    Ok(Json(reply))
}

/// COORDINATOR
#[post("/election/victory/{leader_id}")]
pub async fn victory(
    app: Data<NodeApp>,
    leader_id: Path<NodeId>,
) -> Result<Json<VictoryAck>, BullyError> {
    let ack = app
        .bully
        .send(HandleVictory {
            leader_id: leader_id.into_inner(),
        })
        .await??;
    Ok(Json(ack))
}

#[get("/election/state")]
pub async fn state(app: Data<NodeApp>) -> Result<Json<ElectionStateInfo>, BullyError> {
    Ok(Json(app.bully.send(GetElectionState).await?))
}
