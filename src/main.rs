use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use emotion_api::config::Settings;
use emotion_api::server::routes;
use emotion_api::service::EmotionService;
use emotion_api::torch::TorchDetector;
use emotion_api::util::init_tracing;
use std::sync::Arc;
use std::{env, process};

use tracing::info;

const USAGE: &str = "usage: ./emotion-api [config file]";

fn get_args() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        println!("{USAGE}");
        process::exit(1);
    }

    args.get(1).cloned()
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config_file = get_args();
    let settings = Settings::load(config_file.as_deref()).context("invalid configuration")?;
    init_tracing(&settings.log);

    // The detector is shared by every worker; it serializes model access itself
    let detector = TorchDetector::load(&settings.model).context("failed to load models")?;
    let service = web::Data::new(EmotionService::new(Arc::new(detector)));

    info!(
        "listening on {}:{} with detector {}",
        settings.host,
        settings.port,
        service.detector_name()
    );

    let routes_settings = settings.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure(&routes_settings))
    });
    if let Some(workers) = settings.workers {
        server = server.workers(workers);
    }

    server
        .bind((settings.host.as_str(), settings.port))?
        .run()
        .await?;
    Ok(())
}
