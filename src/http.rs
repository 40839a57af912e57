//! Single JSON endpoint dispatching on `action`.
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::broadcast;
use crate::channels::ChannelConnector;
use crate::db;
use crate::digest;
use crate::error::BotError;
use crate::model::{
    AlertBotConfig, ConnectionTest, Platform, StatusReport, TelegramCredentials,
    WhatsAppCredentials,
};

const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const CORS_ALLOW_METHODS: &str = "POST, OPTIONS";

#[derive(Clone)]
pub struct AppState {
    pub pool: db::Pool,
    pub connector: Arc<dyn ChannelConnector>,
    /// Process-wide credentials, only consulted by the `status` action.
    pub telegram: TelegramCredentials,
    pub whatsapp: WhatsAppCredentials,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BotRequest {
    pub action: Option<String>,
    pub platform: Option<String>,
    pub alert_id: Option<String>,
    pub config: AlertBotConfig,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_action).options(preflight))
        .route("/civic-alert-bot", post(handle_action).options(preflight))
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health() -> &'static str {
    "OK"
}

async fn handle_action(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BotRequest>, JsonRejection>,
) -> Result<Response, BotError> {
    let Json(req) = body.map_err(|rejection| BotError::InvalidBody(rejection.body_text()))?;
    info!(action = ?req.action, "alert bot request");

    match req.action.as_deref() {
        Some("status") => Ok(Json(status(&state).await).into_response()),
        Some("test_connection") => {
            let result = test_connection(&state, req.platform.as_deref(), &req.config).await;
            Ok(Json(result).into_response())
        }
        Some("broadcast_alert") => {
            let alert_id = req
                .alert_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or(BotError::MissingField("alert_id"))?;
            let summary = broadcast::broadcast_alert(
                &state.pool,
                state.connector.as_ref(),
                &req.config,
                alert_id,
            )
            .await?;
            Ok(Json(summary).into_response())
        }
        Some("send_digest") => {
            let summary = digest::send_digest(
                &state.pool,
                state.connector.as_ref(),
                &req.config,
                Utc::now(),
            )
            .await?;
            Ok(Json(summary).into_response())
        }
        other => Err(BotError::UnknownAction(other.map(str::to_string))),
    }
}

async fn status(state: &AppState) -> StatusReport {
    let telegram = state.connector.telegram(&state.telegram);
    let whatsapp = state.connector.whatsapp(&state.whatsapp);
    let (telegram, whatsapp) =
        tokio::join!(telegram.test_connection(), whatsapp.test_connection());
    StatusReport {
        telegram: telegram.into(),
        whatsapp: whatsapp.into(),
    }
}

async fn test_connection(
    state: &AppState,
    platform: Option<&str>,
    config: &AlertBotConfig,
) -> ConnectionTest {
    let Some(platform) = platform.and_then(Platform::parse) else {
        return ConnectionTest::failed(format!(
            "Unsupported platform: {}",
            platform.unwrap_or_default()
        ));
    };
    let channel = state.connector.connect(
        platform,
        &config.telegram_credentials(),
        &config.whatsapp_credentials(),
    );
    channel.test_connection().await
}
