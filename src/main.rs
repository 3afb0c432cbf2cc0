use std::{env, net::SocketAddr};

use axum::{http::header, Router};
use clap::Parser;
use log::{info, warn};
use reqwest::{IntoUrl, RequestBuilder};
use sqlx::SqlitePool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

mod api;
mod billing;
mod db;
mod error;
mod github;
mod models;
mod sync;
mod tags;
mod utils;

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    /// Reqwest client
    reqwest: reqwest::Client,
    /// Base url of the github REST API
    github_api_base: String,
}

impl AppState {
    pub async fn init() -> AppState {
        let pool = db::connect(&env::var("DATABASE_URL").expect("Couldn't get DATABASE_URL env var"))
            .await
            .unwrap();

        db::migrate(&pool).await.unwrap();

        let reqwest = reqwest::Client::new();

        let github_api_base =
            env::var("GITHUB_API_URL").unwrap_or_else(|_| "https://api.github.com".to_owned());

        AppState {
            pool,
            reqwest,
            github_api_base,
        }
    }

    pub fn reqwest_github<U: IntoUrl>(
        &self,
        method: reqwest::Method,
        url: U,
        auth: &str,
    ) -> RequestBuilder {
        self.reqwest
            .request(method, url)
            .header("User-Agent", "WorkTally")
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(auth)
    }
}

#[derive(Parser, Debug)]
#[command(name = "worktally")]
#[command(bin_name = "worktally")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to bind the http server on
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() {
    env_logger::builder().format_timestamp(None).init();

    let cli = Cli::parse();

    if dotenvy::dotenv().is_err() {
        warn!("Error reading .env file");
    }

    let app_state = AppState::init().await;

    let cors = CorsLayer::new()
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .allow_origin(Any);

    let app = Router::new()
        .nest("/", api::router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!("Starting server on {}", cli.addr);

    axum::Server::bind(&cli.addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
