//! API routes

mod error;

use std::fmt::Display;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header::ACCEPT_LANGUAGE, HeaderMap},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::config::Language;
use crate::core::{ChatError, ChatRequest};
use crate::AppState;

pub use error::{handle_panic, ApiError};

const UNAVAILABLE: &str = "AI service is currently unavailable";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub success: bool,
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookReply {
    pub success: bool,
    pub reply: String,
    pub sender: String,
}

impl AppState {
    /// Error details for the client, hidden in production
    fn details(&self, err: impl Display) -> Option<String> {
        if self.config.production {
            None
        } else {
            Some(err.to_string())
        }
    }

    fn chat_error(&self, err: ChatError) -> ApiError {
        match err {
            ChatError::EmptyMessage => ApiError::validation(err.to_string()),
            ChatError::Provider(ref e) => ApiError::service_unavailable(UNAVAILABLE, self.details(e)),
        }
    }
}

/// Non-blank field value
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn request_language(requested: Option<&str>, headers: &HeaderMap) -> Language {
    match requested {
        Some(tag) => Language::resolve(Some(tag)),
        None => headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .map(Language::from_accept_language)
            .unwrap_or_default(),
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        ApiError::validation("Invalid request body").with_details(state.details(&rejection))
    })?;

    let (Some(message), Some(session_id)) = (present(body.message), present(body.session_id))
    else {
        return Err(ApiError::validation("Missing message or sessionId"));
    };

    let request = ChatRequest {
        session_id,
        message,
        language: request_language(body.language.as_deref(), &headers),
    };

    let reply = state
        .chat_engine
        .chat(&request)
        .await
        .map_err(|e| state.chat_error(e))?;

    Ok(Json(ChatReply {
        success: true,
        reply,
    }))
}

/// WhatsApp webhook verification handshake: echo the challenge
async fn verify_webhook(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, ApiError> {
    let (Some(mode), Some(token), Some(challenge)) = (
        present(query.mode),
        present(query.verify_token),
        present(query.challenge),
    ) else {
        return Err(ApiError::validation(
            "Invalid webhook verification parameters",
        ));
    };

    let expected = state.config.verify_token.as_deref();
    if mode == "subscribe" && expected == Some(token.as_str()) {
        tracing::info!("Webhook verified");
        Ok(challenge)
    } else {
        Err(ApiError::forbidden("Webhook verification failed"))
    }
}

async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<WebhookBody>, JsonRejection>,
) -> Result<Json<WebhookReply>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        ApiError::validation("Invalid request body").with_details(state.details(&rejection))
    })?;

    let Some(message) = present(body.message) else {
        return Err(ApiError::validation("Invalid request body"));
    };
    let Some(sender) = present(body.sender).or_else(|| state.config.default_sender.clone()) else {
        return Err(ApiError::validation("Missing sender"));
    };

    let request = ChatRequest {
        session_id: sender.clone(),
        message,
        language: request_language(body.language.as_deref(), &headers),
    };

    let reply = state
        .chat_engine
        .respond(&request)
        .await
        .map_err(|e| state.chat_error(e))?;

    Ok(Json(WebhookReply {
        success: true,
        reply,
        sender,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::prompts::builtin;
    use crate::config::{Config, PersonaProfile, PromptBuilder, Settings};
    use crate::core::{ChatEngine, ConversationStore, FALLBACK_REPLY};
    use crate::providers::testing::ScriptedProvider;

    fn app_with(provider: Arc<ScriptedProvider>, vars: &[(&str, &str)]) -> (Router, Arc<ChatEngine>) {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_settings(Settings::default(), |key| vars.get(key).cloned()).unwrap();

        let store = Arc::new(ConversationStore::new("unused.json", 0));
        let prompts = PromptBuilder::new(PersonaProfile::builtin()).unwrap();
        let chat_engine = Arc::new(ChatEngine::new(provider, store, prompts));

        let state = AppState {
            config: Arc::new(config),
            chat_engine: chat_engine.clone(),
        };
        (router().with_state(state), chat_engine)
    }

    fn app(provider: ScriptedProvider) -> Router {
        app_with(Arc::new(provider), &[("WHATSAPP_VERIFY_TOKEN", "s3cret")]).0
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send_json(app(ScriptedProvider::replying("x")), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_chat_about_person() {
        let app = app(ScriptedProvider::replying("I am Jafar, a React team lead."));
        let (status, body) = send_json(
            app,
            post_json("/chat", json!({ "message": "who is jafar", "sessionId": "s1" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let reply = body["reply"].as_str().unwrap();
        assert!(reply.contains(builtin::EMAIL));
        assert!(!reply.contains("I am Jafar"));
    }

    #[tokio::test]
    async fn test_chat_missing_session_id() {
        let (status, body) = send_json(
            app(ScriptedProvider::replying("x")),
            post_json("/chat", json!({ "message": "hello" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing message or sessionId");
    }

    #[tokio::test]
    async fn test_chat_blank_message() {
        let (status, body) = send_json(
            app(ScriptedProvider::replying("x")),
            post_json("/chat", json!({ "message": "  ", "sessionId": "s1" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing message or sessionId");
    }

    #[tokio::test]
    async fn test_chat_malformed_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send_json(app(ScriptedProvider::replying("x")), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");
        assert!(body["details"].is_string());
    }

    #[tokio::test]
    async fn test_chat_provider_failure_returns_fallback() {
        let (status, body) = send_json(
            app(ScriptedProvider::failing()),
            post_json("/chat", json!({ "message": "hello", "sessionId": "s1" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["reply"], FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_chat_language_selection() {
        let provider = Arc::new(ScriptedProvider::replying("مرحبا"));
        let (app, engine) = app_with(provider.clone(), &[]);

        let (status, _) = send_json(
            app,
            post_json(
                "/chat",
                json!({ "message": "hi", "sessionId": "s1", "language": "Arabic" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(engine.store().get("s1").await.unwrap().len(), 2);
        assert!(provider.calls()[0][0].content.contains("(locale code: ar)"));
    }

    #[test]
    fn test_request_language() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_language(None, &headers), Language::English);

        headers.insert(ACCEPT_LANGUAGE, "ml-IN,en;q=0.5".parse().unwrap());
        assert_eq!(request_language(None, &headers), Language::Malayalam);
        assert_eq!(request_language(Some("arabic"), &headers), Language::Arabic);
        assert_eq!(request_language(Some("klingon"), &headers), Language::English);
    }

    #[tokio::test]
    async fn test_webhook_verification_echoes_challenge() {
        let (status, body) = send(
            app(ScriptedProvider::replying("x")),
            get("/webhook?hub.mode=subscribe&hub.verify_token=s3cret&hub.challenge=123"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"123");
    }

    #[tokio::test]
    async fn test_webhook_verification_wrong_token() {
        let (status, body) = send_json(
            app(ScriptedProvider::replying("x")),
            get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=123"),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Webhook verification failed");
    }

    #[tokio::test]
    async fn test_webhook_verification_wrong_mode() {
        let (status, _) = send(
            app(ScriptedProvider::replying("x")),
            get("/webhook?hub.mode=unsubscribe&hub.verify_token=s3cret&hub.challenge=123"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_verification_without_configured_token() {
        let (app, _) = app_with(Arc::new(ScriptedProvider::replying("x")), &[]);
        let (status, _) = send(
            app,
            get("/webhook?hub.mode=subscribe&hub.verify_token=anything&hub.challenge=123"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_verification_missing_params() {
        let (status, body) = send_json(
            app(ScriptedProvider::replying("x")),
            get("/webhook?hub.mode=subscribe&hub.challenge=123"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid webhook verification parameters");
    }

    #[tokio::test]
    async fn test_webhook_message() {
        let provider = Arc::new(ScriptedProvider::replying("Rust is a systems language."));
        let (app, engine) = app_with(provider, &[]);

        let (status, body) = send_json(
            app,
            post_json("/webhook", json!({ "message": "what is rust?", "sender": "15550001111" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["reply"], "Rust is a systems language.");
        assert_eq!(body["sender"], "15550001111");
        assert_eq!(engine.store().get("15550001111").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_webhook_default_sender() {
        let (app, _) = app_with(
            Arc::new(ScriptedProvider::replying("hi")),
            &[("WEBHOOK_DEFAULT_SENDER", "15550002222")],
        );
        let (status, body) = send_json(app, post_json("/webhook", json!({ "message": "hello" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sender"], "15550002222");
    }

    #[tokio::test]
    async fn test_webhook_missing_fields() {
        let (status, body) = send_json(
            app(ScriptedProvider::replying("x")),
            post_json("/webhook", json!({ "sender": "15550001111" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");

        let (status, body) = send_json(
            app(ScriptedProvider::replying("x")),
            post_json("/webhook", json!({ "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing sender");
    }

    #[tokio::test]
    async fn test_webhook_provider_failure_is_503() {
        let (status, body) = send_json(
            app(ScriptedProvider::failing()),
            post_json("/webhook", json!({ "message": "hi", "sender": "15550001111" })),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], UNAVAILABLE);
        assert!(body["details"].as_str().unwrap().contains("model overloaded"));
    }

    #[tokio::test]
    async fn test_production_hides_details() {
        let (app, _) = app_with(Arc::new(ScriptedProvider::failing()), &[("APP_ENV", "production")]);
        let (status, body) = send_json(
            app,
            post_json("/webhook", json!({ "message": "hi", "sender": "15550001111" })),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["details"].is_null());
    }
}
