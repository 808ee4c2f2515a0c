//! Glove Customizer
//!
//! Server-side core of the 3D glove customizer: per-zone colors, uploaded
//! image layers, composited zone textures and the material table they are
//! bound to, behind an Actix-Web API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

mod api;
mod binder;
mod config;
mod domain;
mod engine;
mod scene;
mod session;
mod state;
mod upload;

use crate::binder::MaterialBinder;
use crate::config::Settings;
use crate::domain::Zone;
use crate::engine::{FontBook, HttpImageFetcher, TextureCompositor};
use crate::scene::MaterialScene;
use crate::session::CustomizerSession;
use crate::upload::CloudinaryClient;

/// Application state shared across all handlers
pub struct AppState {
    pub session: Arc<CustomizerSession>,
    pub fonts_loaded: usize,
    pub started_at: Instant,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("glove_customizer=info".parse()?)
                .add_directive("actix_web=info".parse()?),
        )
        .json()
        .init();

    let settings = Settings::load().context("Failed to load configuration")?;
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let profile = settings.device.profile();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %bind_addr,
        device = ?settings.device.class,
        "Starting Glove Customizer"
    );

    let fonts = FontBook::load(&settings.texture.fonts);
    let fonts_loaded = fonts.len();
    let fetcher = HttpImageFetcher::new(Duration::from_secs(settings.texture.fetch_timeout_secs))
        .context("Failed to build image fetcher")?;
    let compositor = Arc::new(TextureCompositor::new(
        Arc::new(fetcher),
        fonts,
        settings.texture.fit_policy,
    ));

    let scene = match &settings.asset.path {
        Some(path) => match MaterialScene::from_gltf(path) {
            Ok(scene) => scene,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Asset failed to load, using zone materials");
                MaterialScene::with_zones(&Zone::ALL)
            }
        },
        None => {
            info!("No asset configured, using zone materials");
            MaterialScene::with_zones(&Zone::ALL)
        }
    };

    info!(surfaces = ?scene.names().collect::<Vec<_>>(), "Material table ready");

    let binder = Arc::new(MaterialBinder::new(
        compositor,
        scene.into_shared(),
        profile.texture_output_scale,
    ));
    let host = CloudinaryClient::new(settings.upload.clone()).context("Failed to build upload client")?;

    let session = Arc::new(CustomizerSession::new(binder, Arc::new(host), profile));
    session.start().await;

    let workers = settings.server.workers.unwrap_or_else(|| num_cpus::get() * 2);

    let app_state = web::Data::new(AppState {
        session: session.clone(),
        fonts_loaded,
        started_at: Instant::now(),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "glove-customizer"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION"))),
            )
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    session.shutdown();
    Ok(())
}
