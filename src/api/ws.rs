use actix::prelude::*;
use actix_web::web::{Data, Payload};
use actix_web::{get, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app::NodeApp;
use crate::bully::ElectionLog;
use crate::events::{EventBus, Subscription, Topic};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// `{"event": <stream name>, "data": <payload>}`
#[derive(Serialize)]
struct Frame<'a, T> {
    event: &'a str,
    data: &'a T,
}

/// An encoded frame ready for the socket
struct Push(String);

fn encode<T: Serialize>(topic: Topic, data: &T) -> Option<Push> {
    let frame = Frame {
        event: topic.name(),
        data,
    };
    match serde_json::to_string(&frame) {
        Ok(text) => Some(Push(text)),
        Err(e) => {
            tracing::error!("Failed to encode {} frame: {}", topic.name(), e);
            None
        }
    }
}

/// Turn a bus subscription into a stream of frames
fn frames<T>(subscription: Subscription<T>) -> impl Stream<Item = Push>
where
    T: Serialize + Clone + Send + 'static,
{
    let topic = subscription.topic();
    futures::stream::unfold(subscription, |mut subscription| async move {
        subscription.recv().await.map(|value| (value, subscription))
    })
    .filter_map(move |value| futures::future::ready(encode(topic, &value)))
}

/// One dashboard connection. Receives a snapshot on connect, then every
/// frame published on the bus. A client that lags behind loses the oldest
/// frames and keeps going.
pub struct EventSession {
    bus: Arc<EventBus>,
    history: Arc<ElectionLog>,
    last_seen: Instant,
}

impl EventSession {
    pub fn new(bus: Arc<EventBus>, history: Arc<ElectionLog>) -> Self {
        Self {
            bus,
            history,
            last_seen: Instant::now(),
        }
    }

    fn send_snapshot(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let snapshot = self.bus.admin_snapshot();

        let frames = [
            encode(Topic::SeatUpdate, &snapshot.seats),
            encode(Topic::NodeUpdate, &snapshot.nodes),
            encode(Topic::TransactionUpdate, &snapshot.transactions),
            encode(Topic::ElectionUpdate, &self.history.snapshot()),
        ];
        for Push(text) in frames.into_iter().flatten() {
            ctx.text(text);
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_seen) > CLIENT_TIMEOUT {
                tracing::debug!("WebSocket client timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for EventSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("WebSocket client connected");

        // subscribe before the snapshot so nothing falls in between
        ctx.add_stream(frames(self.bus.nodes.subscribe()));
        ctx.add_stream(frames(self.bus.seats.subscribe()));
        ctx.add_stream(frames(self.bus.transactions.subscribe()));
        ctx.add_stream(frames(self.bus.admin.subscribe()));
        ctx.add_stream(frames(self.bus.election.subscribe()));
        ctx.add_stream(frames(self.bus.election_history.subscribe()));

        self.send_snapshot(ctx);
        self.heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("WebSocket client disconnected");
    }
}

impl StreamHandler<Push> for EventSession {
    fn handle(&mut self, push: Push, ctx: &mut Self::Context) {
        ctx.text(push.0);
    }

    // the bus outlives sessions; a closed channel only ends that stream
    fn finished(&mut self, _ctx: &mut Self::Context) {}
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for EventSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(bytes)) => {
                self.last_seen = Instant::now();
                ctx.pong(&bytes);
            }
            Ok(ws::Message::Pong(_)) => self.last_seen = Instant::now(),
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                // push only channel
                self.last_seen = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("WebSocket protocol error: {}", e);
                ctx.stop();
            }
        }
    }
}

#[get("/ws")]
pub async fn connect(
    app: Data<NodeApp>,
    req: HttpRequest,
    stream: Payload,
) -> Result<HttpResponse, actix_web::Error> {
    ws::start(
        EventSession::new(app.bus.clone(), app.history.clone()),
        &req,
        stream,
    )
}
