use actix_web::get;
use actix_web::web::{Data, Json};

use crate::app::NodeApp;
use crate::registry::NodeView;
use crate::transactions::Transaction;

#[get("/node")]
pub async fn nodes(app: Data<NodeApp>) -> Json<Vec<NodeView>> {
    Json(app.registry.views())
}

#[get("/transaction")]
pub async fn transactions(app: Data<NodeApp>) -> Json<Vec<Transaction>> {
    Json(app.transactions.all())
}
