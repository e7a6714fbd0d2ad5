//! Request/response API for non-real-time clients. Speaks directly to the
//! durable store under the same contract as the realtime path.

use crate::store::{DrawingStore, StoreError};
use actix_web::{error, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use system::{epoch_millis, uuid::Uuid, DrawOp, Point, StrokeData};

pub fn configure_room_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/rooms").route(web::post().to(create)));
    cfg.service(web::resource("/api/rooms/join").route(web::post().to(join)));
    cfg.service(web::resource("/api/rooms/{room_id}").route(web::get().to(get)));
    cfg.service(web::resource("/api/rooms/{room_id}/draw").route(web::post().to(append_draw)));
    cfg.service(web::resource("/api/rooms/{room_id}/clear").route(web::post().to(clear)));
}

#[derive(Deserialize)]
struct JoinBody {
    #[serde(rename = "roomId")]
    room_id: String,
}

#[derive(Deserialize)]
struct DrawBody {
    path: Vec<Point>,
    color: String,
    width: f32,
}

fn store_error(err: StoreError) -> actix_web::Error {
    match err {
        StoreError::InvalidRoomId(_) => error::ErrorBadRequest(err.to_string()),
        err => {
            log::warn!("store error in http handler: {}", err);
            error::ErrorInternalServerError("store error")
        }
    }
}

/// Fetch a room record by id, creating it if absent.
async fn get(
    path: web::Path<String>,
    store: web::Data<dyn DrawingStore>,
) -> Result<impl Responder, actix_web::Error> {
    let record = store.create_room(&path).await.map_err(store_error)?;
    Ok(HttpResponse::Ok().json(record))
}

async fn create(store: web::Data<dyn DrawingStore>) -> Result<impl Responder, actix_web::Error> {
    let room_id: String = Uuid::new_v4().simple().to_string()[..8].to_owned();
    store.create_room(&room_id).await.map_err(store_error)?;
    Ok(HttpResponse::Ok().json(json!({ "roomId": room_id })))
}

async fn join(
    body: web::Json<JoinBody>,
    store: web::Data<dyn DrawingStore>,
) -> Result<impl Responder, actix_web::Error> {
    store.create_room(&body.room_id).await.map_err(store_error)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "roomId": body.room_id })))
}

async fn append_draw(
    path: web::Path<String>,
    body: web::Json<DrawBody>,
    store: web::Data<dyn DrawingStore>,
) -> Result<impl Responder, actix_web::Error> {
    let body = body.into_inner();
    let op = DrawOp::Stroke(StrokeData {
        path: body.path,
        color: body.color,
        width: body.width,
        timestamp: epoch_millis(),
    });
    store.append_draw_op(&path, op).await.map_err(store_error)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

async fn clear(
    path: web::Path<String>,
    store: web::Data<dyn DrawingStore>,
) -> Result<impl Responder, actix_web::Error> {
    store.reset_draw_ops(&path).await.map_err(store_error)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
