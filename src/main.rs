use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use ai_image_detector::config::Config;
use ai_image_detector::handlers;
use ai_image_detector::model::{AppState, OnnxDetector};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();

    // Blocking one-time load; the process must not serve without a model.
    let detector = OnnxDetector::load(&config.model_path)?;
    let state = web::Data::new(AppState::new(Arc::new(detector)));

    log::info!("server running at http://{}", config.bind_addr);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(web::resource("/classify").route(web::post().to(handlers::classify)))
    })
    .bind(config.bind_addr.as_str())?
    .run()
    .await?;

    Ok(())
}
