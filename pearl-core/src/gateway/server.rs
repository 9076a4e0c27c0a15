//! HTTP API server built on axum.

use super::error::ApiError;
use crate::assistant::IdeaAssistant;
use crate::config::PearlConfig;
use crate::countries;
use crate::providers::{TextGenerator, create_generator};
use crate::research::{Pipeline, ResearchEngine};
use crate::runner::AutoRunner;
use crate::search::{SearchProvider, create_search_provider};
use crate::store::{BlobStore, RowStore};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

type ApiResult = Result<Json<Value>, ApiError>;

/// Shared handler state. Providers that could not be built keep the reason,
/// reported when an endpoint needs them.
#[derive(Clone)]
pub struct AppState {
    config: Arc<PearlConfig>,
    rows: Arc<dyn RowStore>,
    blobs: Arc<dyn BlobStore>,
    runner: Arc<AutoRunner>,
    search: Result<Arc<dyn SearchProvider>, String>,
    generator: Result<Arc<dyn TextGenerator>, String>,
}

impl AppState {
    /// Build providers from `config`.
    pub fn from_config(
        config: PearlConfig,
        rows: Arc<dyn RowStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let search = create_search_provider(&config.search).map_err(|e| e.to_string());
        let generator = create_generator(&config.llm).map_err(|e| e.to_string());
        Self::new(config, rows, blobs, search, generator)
    }

    pub fn new(
        config: PearlConfig,
        rows: Arc<dyn RowStore>,
        blobs: Arc<dyn BlobStore>,
        search: Result<Arc<dyn SearchProvider>, String>,
        generator: Result<Arc<dyn TextGenerator>, String>,
    ) -> Self {
        let runner = Arc::new(AutoRunner::new(Arc::clone(&blobs)));
        Self {
            config: Arc::new(config),
            rows,
            blobs,
            runner,
            search,
            generator,
        }
    }

    fn search(&self) -> Result<Arc<dyn SearchProvider>, ApiError> {
        self.search.clone().map_err(ApiError::internal)
    }

    fn generator(&self) -> Result<Arc<dyn TextGenerator>, ApiError> {
        self.generator.clone().map_err(ApiError::internal)
    }

    fn pipeline(&self) -> Result<Pipeline, ApiError> {
        let engine = ResearchEngine::new(self.search()?, self.generator()?, &self.config);
        Ok(Pipeline::new(
            engine,
            Arc::clone(&self.rows),
            Arc::clone(&self.blobs),
            &self.config,
        ))
    }

    fn assistant(&self) -> Result<IdeaAssistant, ApiError> {
        Ok(IdeaAssistant::new(
            self.generator()?,
            Arc::clone(&self.rows),
            self.config.retry.clone(),
            self.config.research.focus_market.clone(),
        ))
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/countries", get(list_countries))
        .route("/api/run-country", post(run_country))
        .route("/api/auto-run/status", get(runner_status).post(runner_advance))
        .route("/api/auto-run/start", post(runner_start))
        .route("/api/auto-run/stop", post(runner_stop))
        .route("/api/idea-chat", post(idea_chat))
        .route("/api/miami-adapt", post(miami_adapt))
        .route("/api/experiment-pack", post(experiment_pack))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve the API on the configured address until Ctrl-C.
pub async fn serve(state: AppState) -> Result<(), std::io::Error> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = addr.as_str(), "API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

/// Merge `ok: true` into a serializable body.
fn ok_json<T: Serialize>(body: T) -> ApiResult {
    let value = serde_json::to_value(body).map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(match value {
        Value::Object(mut map) => {
            map.insert("ok".into(), Value::Bool(true));
            Value::Object(map)
        }
        other => json!({ "ok": true, "data": other }),
    }))
}

/// Parse a JSON body; an empty body reads as the default.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}

async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let search_name = state.search.as_ref().ok().map(|s| s.name().to_string());
    Json(json!({
        "ok": true,
        "env": {
            "hasSerperKey": state.config.search.has_api_key(),
            "hasGeminiKey": state.config.llm.has_api_key(),
            "liveSearchProvider": search_name.unwrap_or_else(|| "OFF".to_string()),
            "model": state.generator.as_ref().ok().map(|g| g.model_name().to_string()),
            "focusMarket": state.config.research.focus_market,
        }
    }))
}

#[derive(Debug, Default, Deserialize)]
struct CountryQuery {
    #[serde(default)]
    q: String,
}

async fn list_countries(Query(query): Query<CountryQuery>) -> ApiResult {
    let found: Vec<Value> = countries::search(&query.q)
        .into_iter()
        .map(|c| json!({ "code": c.code, "name_es": c.name_es, "name_en": c.name_en, "region": c.region }))
        .collect();
    ok_json(json!({ "countries": found }))
}

#[derive(Debug, Default, Deserialize)]
struct RunCountryRequest {
    #[serde(default)]
    country_code: String,
    topic: Option<String>,
}

async fn run_country(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let req: RunCountryRequest = parse_body(&body)?;
    let pipeline = state.pipeline()?;
    let report = pipeline
        .run_country(&req.country_code, req.topic.as_deref())
        .await?;
    ok_json(report)
}

async fn runner_status(State(state): State<AppState>) -> ApiResult {
    ok_json(state.runner.status().await?)
}

#[derive(Debug, Default, Deserialize)]
struct AdvanceRequest {
    #[serde(default)]
    success: bool,
    country_code: Option<String>,
    expected_cursor: Option<usize>,
}

async fn runner_advance(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let req: AdvanceRequest = parse_body(&body)?;
    let cursor = state
        .runner
        .advance(req.success, req.country_code.as_deref(), req.expected_cursor)
        .await?;
    ok_json(json!({ "cursor": cursor }))
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    #[serde(default)]
    reset: bool,
}

async fn runner_start(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let req: StartRequest = parse_body(&body)?;
    let runner_state = state.runner.start(req.reset).await?;
    ok_json(json!({ "state": runner_state }))
}

async fn runner_stop(State(state): State<AppState>) -> ApiResult {
    let runner_state = state.runner.stop().await?;
    ok_json(json!({ "status": runner_state.status }))
}

#[derive(Debug, Default, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    fingerprint: String,
}

async fn idea_chat(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let req: ChatRequest = parse_body(&body)?;
    if req.fingerprint.trim().is_empty() {
        return Err(ApiError::bad_request("Missing fingerprint"));
    }
    let reply = state.assistant()?.chat(&req.fingerprint).await?;
    ok_json(json!({ "chat_md": reply.markdown, "cached": reply.cached }))
}

#[derive(Debug, Default, Deserialize)]
struct AdaptRequest {
    #[serde(default)]
    fingerprint: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    sources: Vec<String>,
}

async fn miami_adapt(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let req: AdaptRequest = parse_body(&body)?;
    if req.fingerprint.trim().is_empty() {
        return Err(ApiError::bad_request("Missing fingerprint"));
    }
    let reply = state
        .assistant()?
        .adapt(&req.fingerprint, &req.title, &req.summary, &req.sources)
        .await?;
    ok_json(json!({ "adaptation": reply.markdown, "cached": reply.cached }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackRequest {
    #[serde(default)]
    idea_title: String,
    #[serde(default)]
    idea_summary: String,
    #[serde(default)]
    country: String,
    topic: Option<String>,
}

async fn experiment_pack(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let req: PackRequest = parse_body(&body)?;
    if req.idea_title.trim().is_empty() || req.idea_summary.trim().is_empty() {
        return Err(ApiError::bad_request("Missing idea details"));
    }
    let out = state
        .assistant()?
        .experiment_pack(&req.idea_title, &req.idea_summary, &req.country, req.topic.as_deref())
        .await?;
    ok_json(json!({ "pack": out.pack, "logicProof": out.modifications }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockTextGenerator;
    use crate::search::MockSearchProvider;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(generator: Result<Arc<dyn TextGenerator>, String>) -> Router {
        let store = Arc::new(MemoryStore::new());
        let search: Arc<dyn SearchProvider> = Arc::new(MockSearchProvider::new());
        router(AppState::new(
            PearlConfig::default(),
            store.clone(),
            store,
            Ok(search),
            generator,
        ))
    }

    async fn call(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = ServiceExt::<Request<Body>>::oneshot(app, req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, json) = call(app(Err("no key".into())), "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_countries_search() {
        let (status, json) = call(app(Err("no key".into())), "GET", "/api/countries?q=esp", "").await;
        assert_eq!(status, StatusCode::OK);
        let codes: Vec<&str> = json["countries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["code"].as_str().unwrap())
            .collect();
        assert!(codes.contains(&"ES"));
    }

    #[tokio::test]
    async fn test_missing_generator_is_500() {
        let (status, json) = call(
            app(Err("Authentication failed for gemini".into())),
            "POST",
            "/api/run-country",
            r#"{"country_code": "ES"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "Authentication failed for gemini");
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let (status, json) = call(app(Err("x".into())), "POST", "/api/idea-chat", "{nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    }

    #[tokio::test]
    async fn test_idea_chat_missing_fingerprint() {
        let generator: Arc<dyn TextGenerator> = Arc::new(MockTextGenerator::new());
        let (status, json) = call(app(Ok(generator)), "POST", "/api/idea-chat", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing fingerprint");
    }

    #[tokio::test]
    async fn test_runner_start_with_empty_body() {
        let (status, json) = call(app(Err("x".into())), "POST", "/api/auto-run/start", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"]["status"], "RUNNING");
    }
}
