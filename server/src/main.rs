use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

use server::config::Config;
use server::handlers;
use server::server::spawn_server;
use server::store::{DrawingStore, FileStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = Config::from_env();
    log::info!("starting on {} (data dir {:?})", config.bind_addr, config.data_dir);

    let store: Arc<dyn DrawingStore> = Arc::new(FileStore::new(&config.data_dir));
    let srv_tx = spawn_server(store.clone());

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(srv_tx.clone()))
            .app_data(web::Data::from(store.clone()))
            .configure(handlers::root)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
