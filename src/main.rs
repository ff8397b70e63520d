use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use clap::Parser;
use eyre::Result;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::debug;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::auth_layer::init_data_auth_middleware;
use crate::config::Config;
use crate::delivery::TelegramChannel;
use crate::service::ServiceState;
use crate::validation::MAX_PHOTO_BYTES;
use crate::worker::Worker;

mod auth_layer;
mod config;
mod delivery;
mod dispatcher;
mod error;
mod models;
mod notify_repo;
mod post_repo;
mod post_routes;
mod profile_repo;
mod profile_routes;
mod schema;
mod service;
mod social_routes;
mod validation;
mod worker;

/// Header carrying the signed identity payload on every authenticated call.
pub const INIT_DATA_HEADER: &'static str = "x-init-data";

pub type ServiceArcState = State<Arc<ServiceState>>;

#[derive(Parser, Debug)]
#[command(name = "skillnet")]
#[command(about = "Skillnet server binary")]
struct Args {
    /// Override BIND_ADDR from the environment
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // axum logs rejections from built-in extractors with the `axum::rejection`
                // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
                "skillnet_server=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    debug!("Initializing resources");
    std::fs::create_dir_all(&config.upload_dir)?;

    let channel = Arc::new(TelegramChannel::new(&config));
    let (sender, receiver) = mpsc::unbounded_channel();

    let state = Arc::new(ServiceState::new(config, channel, sender)?);
    debug!("Initialized server resources [1/2]");

    let worker = Worker::new(state.clone(), receiver);
    debug!("Initialized worker resources [2/2]");

    let app = Router::new()
        .route(
            "/profile/me",
            get(profile_routes::my_profile).delete(profile_routes::delete_profile),
        )
        .route("/profile", post(profile_routes::save_profile))
        .route("/profile/language", post(profile_routes::save_language))
        .route("/profile/theme", post(profile_routes::save_theme))
        .route("/profile/custom-theme", post(profile_routes::save_custom_theme))
        .route("/profile/status", post(profile_routes::save_status))
        .route("/profile/privacy", post(profile_routes::save_privacy))
        .route("/profile/:user_id", get(profile_routes::user_profile))
        .route(
            "/profile/:user_id/follow",
            post(social_routes::follow).delete(social_routes::unfollow),
        )
        .route("/profile/:user_id/follows", get(social_routes::followed_by))
        .route("/profile/:user_id/following", get(social_routes::following))
        .route("/profiles", get(profile_routes::directory))
        .route("/posts", post(post_routes::create_post).get(post_routes::posts_feed))
        .route("/posts/mine", get(post_routes::my_posts))
        .route(
            "/posts/:post_id",
            put(post_routes::update_post).delete(post_routes::delete_post),
        )
        .route("/posts/:post_id/respond", post(post_routes::respond_to_post))
        .route("/notifications", get(social_routes::notifications))
        .route_layer(from_fn_with_state(state.clone(), init_data_auth_middleware))
        .route("/config", get(social_routes::app_config))
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + 1024 * 1024))
        .with_state(state.clone());

    let bind_addr = state.config.bind_addr.clone();
    debug!("Running on {}", &bind_addr);
    let tcp_listener = TcpListener::bind(bind_addr).await.expect("Couldn't create tcp listener");
    axum::serve(tcp_listener, app).await?;

    worker.cancel();

    Ok(())
}
