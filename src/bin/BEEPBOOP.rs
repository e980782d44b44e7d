//! BEEP BOOP. The bot binary: configuration, session bootstrap, and the
//! axum webhook server the Events API delivers to.
#![allow(non_snake_case)]

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

use BEEPBOOP::{Beepboop, FactClient, Message, SlackFace, Store};

/// One Events API delivery. Anything we don't model explicitly lands in
/// `rest`, which is where the url_verification challenge lives.
#[derive(Deserialize, Debug)]
struct IncomingEvent {
    token: String,
    #[serde(rename = "type")]
    message_type: Option<String>,
    event: Option<Message>,
    #[serde(flatten)]
    rest: HashMap<String, serde_json::Value>,
}

#[derive(Serialize, Debug)]
struct ChallengeResponse {
    challenge: String,
}

/// Handler state: the face plus the verification token Slack includes in
/// every delivery.
#[derive(Clone)]
struct AppState {
    face: SlackFace,
    verification: String,
}

async fn ping(Extension(state): Extension<AppState>) -> impl IntoResponse {
    match state.face.brain().random_joke().await {
        Ok(joke) => (StatusCode::OK, joke),
        Err(e) => {
            log::error!("DATABASE ERROR: {e:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to find a joke".to_string(),
            )
        }
    }
}

async fn incoming(
    Extension(state): Extension<AppState>,
    Json(incoming): Json<IncomingEvent>,
) -> impl IntoResponse {
    // If the token doesn't match, yell and bail.
    if incoming.token != state.verification {
        return (StatusCode::BAD_REQUEST, "invalid payload".to_string());
    }

    match incoming.message_type.as_deref() {
        Some("url_verification") => {
            let challenge = incoming
                .rest
                .get("challenge")
                .and_then(|c| c.as_str())
                .unwrap_or_default()
                .to_string();
            match serde_json::to_string(&ChallengeResponse { challenge }) {
                Ok(body) => (StatusCode::OK, body),
                Err(e) => {
                    log::error!("could not serialize challenge response: {e:?}");
                    (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                }
            }
        }
        Some("event_callback") => {
            if let Some(event) = incoming.event {
                // Storage and channel-lookup failures end here: logged, no
                // reply sent, and we keep serving.
                if let Err(e) = state.face.handle_message(&event).await {
                    log::error!("dropping reply: {e:?}");
                }
            } else {
                log::info!("event_callback with no event; ignoring");
            }
            (StatusCode::OK, "OK".to_string())
        }
        Some(v) => {
            log::info!("unhandled type: {v}");
            (StatusCode::NOT_IMPLEMENTED, "unimplemented".to_string())
        }
        None => (StatusCode::IM_A_TEAPOT, "I'm a teapot".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    simple_logger::init_with_env().ok();

    let slack_token = std::env::var("SLACK_TOKEN")
        .context("You must provide a valid slack api token in the env var SLACK_TOKEN.")?;
    let verification = std::env::var("VERIFICATION_TOKEN")
        .context("You must provide your slack verification token in the env var VERIFICATION_TOKEN.")?;
    let bot_name = std::env::var("BOT_NAME").unwrap_or_else(|_| "beepboop".to_string());
    let db_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "data/beepboop.db".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "5000".to_string());
    let prefix = std::env::var("ROUTE_PREFIX").unwrap_or_else(|_| "".to_string());

    log::info!("MEMORY @ {db_path}");
    // Startup precondition: the database must already exist and be seeded.
    // A missing path is a broken deployment; die immediately and noisily.
    let store = match Store::open(&db_path).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("{e:?}");
            std::process::exit(1);
        }
    };

    let http = reqwest::Client::new();
    let brain = Beepboop::new(bot_name, store, FactClient::new(http.clone()));
    let face = SlackFace::connect(slack_token, http, brain).await?;

    if let Err(e) = face.maybe_welcome().await {
        log::error!("first-run check went sideways: {e:?}");
    }

    let state = AppState { face, verification };
    let app = Router::new()
        .route(&format!("{prefix}/ping"), get(ping))
        .route(&format!("{prefix}/incoming"), post(incoming))
        .layer(Extension(state));

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Could not parse {host}:{port} as a socket address"))?;
    log::info!("beep boop: listening for triggers on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
