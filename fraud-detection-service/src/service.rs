use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn,
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use workspace_client::{
    ApiClient, Genie, PollPolicy, Sleeper, StatementExecution, TokioSleeper, VectorSearch,
    WorkspaceClient,
};

use crate::{
    agent::{ClaimAnalyzer, ReasoningDriver, RigDriver},
    analytics::{InsightsDashboard, InsightsService, QueryCache, resolve_genie_space},
    config::AppConfig,
    gateway::FunctionGateway,
    models::{AnalyzeClaimRequest, AskRequest, CaseSearchQuery, QuickCheckRequest},
    presentation::{AnalysisReport, GenieView, VerdictBanner},
    samples::{GENIE_EXAMPLE_QUESTIONS, SAMPLE_CLAIMS, find_sample},
    telemetry::correlation_id_middleware,
    tools::TOOL_NAMES,
    vector::FraudPatternSearch,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

pub const NOT_CONNECTED: &str = "⚠️ Not connected to Databricks";

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn upstream_error(message: &str) -> ApiError {
    (StatusCode::BAD_GATEWAY, Json(json!({ "error": message })))
}

fn unavailable_error(details: &str) -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": NOT_CONNECTED,
            "details": details
        })),
    )
}

/// Genie client whose space id is looked up on first use. Only a found space
/// is kept, so a lookup that fails while the warehouse is cold is retried on
/// the next question.
#[derive(Clone)]
pub struct GenieAccess {
    api: Arc<dyn ApiClient>,
    config: Arc<AppConfig>,
    genie: Arc<OnceCell<Genie>>,
}

impl GenieAccess {
    pub fn new(api: Arc<dyn ApiClient>, config: Arc<AppConfig>) -> Self {
        Self {
            api,
            config,
            genie: Arc::new(OnceCell::new()),
        }
    }

    pub async fn get(&self) -> Option<&Genie> {
        self.genie
            .get_or_try_init(|| async {
                let statements = StatementExecution::new(self.api.clone());
                match resolve_genie_space(&self.config, &statements).await {
                    Some(space_id) => Ok(Genie::new(self.api.clone(), space_id)),
                    None => {
                        warn!("Genie space not configured; natural language queries disabled");
                        Err(())
                    }
                }
            })
            .await
            .ok()
    }

    /// The space id known without a lookup, if any.
    pub fn known_space_id(&self) -> Option<&str> {
        self.genie
            .get()
            .map(Genie::space_id)
            .or(self.config.genie_space_id.as_deref())
    }
}

/// Everything that needs a live workspace connection.
#[derive(Clone)]
pub struct Platform {
    pub analyzer: ClaimAnalyzer,
    pub insights: InsightsService,
    pub genie: GenieAccess,
}

impl Platform {
    pub fn new(
        config: &AppConfig,
        api: Arc<dyn ApiClient>,
        driver: Arc<dyn ReasoningDriver>,
        cache: Arc<QueryCache>,
    ) -> Self {
        let statements = StatementExecution::new(api.clone());
        let gateway = Arc::new(FunctionGateway::new(
            statements.clone(),
            &config.warehouse_id,
            &config.catalog,
            &config.schema,
        ));
        let patterns = Arc::new(FraudPatternSearch::new(
            VectorSearch::new(api.clone()),
            config.vector_index(),
        ));

        Self {
            analyzer: ClaimAnalyzer::new(driver, gateway, patterns),
            insights: InsightsService::new(
                statements,
                &config.warehouse_id,
                config.analysis_table(),
                cache,
            ),
            genie: GenieAccess::new(api, Arc::new(config.clone())),
        }
    }
}

#[derive(Clone)]
pub enum Connection {
    Connected(Platform),
    Disconnected { reason: String },
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub connection: Connection,
    pub poll_policy: PollPolicy,
    pub sleeper: Arc<dyn Sleeper>,
}

impl AppState {
    fn platform(&self) -> Result<&Platform, ApiError> {
        match &self.connection {
            Connection::Connected(platform) => Ok(platform),
            Connection::Disconnected { reason } => Err(unavailable_error(reason)),
        }
    }
}

pub async fn create_app(config: AppConfig) -> Router {
    let app_state = create_app_state(config).await;
    build_router(app_state)
}

/// Connects to the workspace once, without any remote calls. A failure is
/// logged and leaves the service running with platform-backed endpoints
/// disabled.
pub async fn create_app_state(config: AppConfig) -> AppState {
    let connection = match WorkspaceClient::from_env() {
        Ok(client) => {
            let client = Arc::new(client);
            info!(host = %client.host(), "Workspace client initialized");

            let api: Arc<dyn ApiClient> = client.clone();
            let driver = Arc::new(RigDriver::new(client, &config.llm_endpoint));
            Connection::Connected(Platform::new(
                &config,
                api,
                driver,
                Arc::new(QueryCache::default()),
            ))
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Databricks client");
            Connection::Disconnected {
                reason: e.to_string(),
            }
        }
    };

    AppState {
        config: Arc::new(config),
        connection,
        poll_policy: PollPolicy::default(),
        sleeper: Arc::new(TokioSleeper),
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/claims/samples", get(list_samples))
        .route("/claims/analyze", post(analyze_claim))
        .route("/claims/quick-check", post(quick_check))
        .route("/cases/search", get(search_cases))
        .route("/insights", get(insights_dashboard))
        .route("/insights/questions", get(genie_questions))
        .route("/insights/ask", post(ask_genie))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "AI Fraud Detection",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Healthcare claim fraud analysis with a tool-calling agent, analytics and natural language queries",
        "navigation": {
            "Home": "Dashboard",
            "Claim Analysis": "AI Agent",
            "Fraud Insights": "Analytics",
            "Case Search": "Similar",
            "Quick Check": "Classification"
        },
        "endpoints": {
            "GET /status": "Environment and platform connection status",
            "GET /claims/samples": "Sample claims",
            "POST /claims/analyze": "Analyze a claim with the AI agent",
            "POST /claims/quick-check": "Classify a claim without the agent",
            "GET /cases/search?q=": "Search similar fraud cases",
            "GET /insights": "Fraud analytics dashboard",
            "GET /insights/questions": "Example Genie questions",
            "POST /insights/ask": "Ask Genie a question about fraud data",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    let (connected, message, genie_space) = match &state.connection {
        Connection::Connected(platform) => (
            true,
            "✅ Connected to Databricks".to_string(),
            platform.genie.known_space_id().map(str::to_string),
        ),
        Connection::Disconnected { reason } => (false, format!("{NOT_CONNECTED}: {reason}"), None),
    };

    Json(json!({
        "environment": config.environment,
        "catalog": config.catalog,
        "schema": config.schema,
        "warehouse_id": config.warehouse_id,
        "platform": {
            "connected": connected,
            "message": message
        },
        "llm_endpoint": config.llm_endpoint,
        "tools": TOOL_NAMES.len(),
        "genie": {
            "available": genie_space.is_some(),
            "space_id": genie_space,
            "lookup_on_first_question": connected && genie_space.is_none()
        }
    }))
}

async fn list_samples() -> Json<Value> {
    Json(json!({ "samples": SAMPLE_CLAIMS }))
}

fn resolve_claim_text(request: &AnalyzeClaimRequest) -> Result<String, ApiError> {
    if let Some(text) = request.claim_text.as_deref().filter(|t| !t.trim().is_empty()) {
        return Ok(text.to_string());
    }
    match request.sample.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(name) => find_sample(name)
            .map(|sample| sample.claim_text.to_string())
            .ok_or_else(|| bad_request_error(&format!("Unknown sample claim: {name}"))),
        None => Err(bad_request_error("Please enter claim details")),
    }
}

async fn analyze_claim(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeClaimRequest>,
) -> ApiResult<AnalysisReport> {
    let claim_text = resolve_claim_text(&request)?;
    let platform = state.platform()?;

    match platform.analyzer.analyze(&claim_text).await {
        Ok(analysis) => Ok(Json(AnalysisReport::from_analysis(&analysis))),
        Err(e) => {
            error!(error = %e, "Agent run failed");
            Err(internal_error("Error running agent", &e.to_string()))
        }
    }
}

async fn quick_check(
    State(state): State<AppState>,
    Json(request): Json<QuickCheckRequest>,
) -> ApiResult<Value> {
    if request.claim_text.trim().is_empty() {
        return Err(bad_request_error("Please enter claim details"));
    }
    let platform = state.platform()?;

    let claim = platform
        .analyzer
        .gateway()
        .classify(&request.claim_text)
        .await
        .ok_or_else(|| upstream_error("Classification failed"))?;

    Ok(Json(json!({
        "verdict": VerdictBanner::from_classification(&claim.classification),
        "classification": claim.payload
    })))
}

async fn search_cases(
    State(state): State<AppState>,
    Query(query): Query<CaseSearchQuery>,
) -> ApiResult<Value> {
    if query.q.trim().is_empty() {
        return Err(bad_request_error("Please enter a search query"));
    }
    let platform = state.platform()?;

    let matches = platform.analyzer.patterns().search(&query.q).await;
    if let Some(message) = matches.get("error").and_then(Value::as_str) {
        return Err(upstream_error(message));
    }

    Ok(Json(json!({
        "query": query.q,
        "matches": matches
    })))
}

async fn insights_dashboard(State(state): State<AppState>) -> ApiResult<InsightsDashboard> {
    let platform = state.platform()?;
    Ok(Json(platform.insights.dashboard().await))
}

async fn genie_questions() -> Json<Value> {
    Json(json!({ "questions": GENIE_EXAMPLE_QUESTIONS }))
}

async fn ask_genie(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> ApiResult<GenieView> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(bad_request_error("Please enter a question"));
    }
    let platform = state.platform()?;

    let Some(genie) = platform.genie.get().await else {
        return Ok(Json(GenieView::unavailable(question)));
    };

    info!(space_id = %genie.space_id(), "Asking Genie");
    let view = match genie
        .ask(question, state.poll_policy, state.sleeper.as_ref())
        .await
    {
        Ok(outcome) => GenieView::from_outcome(question, outcome),
        Err(e) => {
            error!(error = %e, "Genie query failed");
            GenieView::error(question, e)
        }
    };
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedDriver;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use workspace_client::testing::{RecordingSleeper, ScriptedApiClient};

    fn connected_state(
        api: Arc<ScriptedApiClient>,
        driver: Arc<ScriptedDriver>,
        genie_space_id: Option<&str>,
    ) -> AppState {
        let config = AppConfig {
            genie_space_id: genie_space_id.map(str::to_string),
            ..AppConfig::default()
        };
        let platform = Platform::new(&config, api, driver, Arc::new(QueryCache::default()));
        AppState {
            config: Arc::new(config),
            connection: Connection::Connected(platform),
            poll_policy: PollPolicy::default(),
            sleeper: Arc::new(RecordingSleeper::new()),
        }
    }

    fn disconnected_state() -> AppState {
        AppState {
            config: Arc::new(AppConfig::default()),
            connection: Connection::Disconnected {
                reason: "DATABRICKS_HOST is not set".to_string(),
            },
            poll_policy: PollPolicy::default(),
            sleeper: Arc::new(RecordingSleeper::new()),
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn classification_cell(cell: &str) -> Value {
        json!({ "status": { "state": "SUCCEEDED" }, "result": { "data_array": [[cell]] } })
    }

    #[tokio::test]
    async fn test_health_and_status_when_disconnected() {
        let router = build_router(disconnected_state());

        let (status, body) = send(router.clone(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (_, body) = send(router, get_request("/status")).await;
        assert_eq!(body["platform"]["connected"], false);
        assert_eq!(body["catalog"], "fraud_detection_dev");
        assert_eq!(body["tools"], 4);
        assert_eq!(body["genie"]["available"], false);
    }

    #[tokio::test]
    async fn test_platform_routes_are_unavailable_when_disconnected() {
        let router = build_router(disconnected_state());

        let (status, body) = send(
            router.clone(),
            post_json("/claims/analyze", json!({ "sample": "Phantom Billing" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], NOT_CONNECTED);

        let (status, _) = send(router.clone(), get_request("/insights")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        // static content stays available
        let (status, body) = send(router, get_request("/claims/samples")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["samples"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_blank_claim_is_rejected() {
        let router = build_router(disconnected_state());
        let (status, body) = send(
            router.clone(),
            post_json("/claims/analyze", json!({ "claim_text": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please enter claim details");

        let (status, body) = send(
            router,
            post_json("/claims/analyze", json!({ "sample": "Custom" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unknown sample claim: Custom");
    }

    #[tokio::test]
    async fn test_analyze_sample_claim() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(classification_cell(
            "{\"is_fraudulent\": true, \"fraud_probability\": 0.92, \"fraud_type\": \"Upcoding\", \"confidence\": 0.9}",
        ));
        let driver = Arc::new(ScriptedDriver::new(
            vec![("classify_claim", json!({ "claim_text": "CLM-2024-045" }))],
            "This claim shows a clear upcoding pattern.",
        ));
        let router = build_router(connected_state(api, driver.clone(), None));

        let (status, body) = send(
            router,
            post_json("/claims/analyze", json!({ "sample": "Upcoding Scheme" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_tool_calls"], 1);
        assert_eq!(body["panels"][0]["tool"], "classify_claim");
        assert_eq!(body["panels"][0]["output"]["verdict"]["metric"], "Risk: 92.0%");
        assert_eq!(body["metrics"]["tools_used"], "1/4");
        assert_eq!(
            body["final_answer"],
            "This claim shows a clear upcoding pattern."
        );
        assert!(driver.prompts()[0].1.contains("CLM-2024-045"));
    }

    #[tokio::test]
    async fn test_quick_check_verdicts() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(classification_cell(
            "{\"is_fraudulent\": false, \"confidence\": 0.85}",
        ));
        api.push_ok(json!({ "status": { "state": "FAILED" } }));
        let router = build_router(connected_state(
            api,
            Arc::new(ScriptedDriver::new(Vec::new(), "")),
            None,
        ));

        let (status, body) = send(
            router.clone(),
            post_json("/claims/quick-check", json!({ "claim_text": "wellness visit" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"]["tone"], "legitimate");
        assert_eq!(body["verdict"]["metric"], "Confidence: 85.0%");
        assert_eq!(
            body["classification"],
            json!({ "is_fraudulent": false, "confidence": 0.85 })
        );

        let (status, body) = send(
            router,
            post_json("/claims/quick-check", json!({ "claim_text": "wellness visit" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Classification failed");
    }

    #[tokio::test]
    async fn test_case_search() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(json!({
            "result": { "data_array": [["doc-7", "scheme", "Phantom billing", "Services never rendered"]] }
        }));
        api.push_ok(json!({ "error_code": "NOT_FOUND", "message": "Index not found" }));
        let router = build_router(connected_state(
            api.clone(),
            Arc::new(ScriptedDriver::new(Vec::new(), "")),
            None,
        ));

        let (status, body) = send(router.clone(), get_request("/cases/search?q=phantom%20billing")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matches"][0]["title"], "Phantom billing");
        assert_eq!(
            api.requests()[0].body.as_ref().unwrap()["query_text"],
            "phantom billing"
        );

        let (status, body) = send(router, get_request("/cases/search?q=anything")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Vector Search error: Index not found");
    }

    #[tokio::test]
    async fn test_ask_genie_without_space() {
        let router = build_router(connected_state(
            Arc::new(ScriptedApiClient::new()),
            Arc::new(ScriptedDriver::new(Vec::new(), "")),
            None,
        ));
        let (status, body) = send(
            router,
            post_json("/insights/ask", json!({ "question": "Show me all fraudulent claims" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "unavailable");
    }

    #[tokio::test]
    async fn test_genie_space_is_looked_up_on_first_question() {
        let api = Arc::new(ScriptedApiClient::new());
        let state = connected_state(
            api.clone(),
            Arc::new(ScriptedDriver::new(Vec::new(), "")),
            None,
        );
        let router = build_router(state);
        assert!(api.requests().is_empty(), "no remote calls before serving");

        let (_, body) = send(router.clone(), get_request("/status")).await;
        assert_eq!(body["genie"]["available"], false);
        assert_eq!(body["genie"]["lookup_on_first_question"], true);

        // cold warehouse: the failed lookup is not remembered
        api.push_ok(json!({ "status": { "state": "PENDING" } }));
        let (_, body) = send(
            router.clone(),
            post_json("/insights/ask", json!({ "question": "Show fraud trends by month" })),
        )
        .await;
        assert_eq!(body["status"], "unavailable");

        api.push_ok(json!({
            "status": { "state": "SUCCEEDED" },
            "result": { "data_array": [["space-9"]] }
        }));
        api.push_ok(json!({}));
        api.push_ok(json!({}));
        for _ in 0..2 {
            let (_, body) = send(
                router.clone(),
                post_json("/insights/ask", json!({ "question": "Show fraud trends by month" })),
            )
            .await;
            assert_eq!(body["status"], "start_failed");
        }

        let paths: Vec<_> = api.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            [
                "/api/2.0/sql/statements",
                "/api/2.0/sql/statements",
                "/api/2.0/genie/spaces/space-9/start-conversation",
                "/api/2.0/genie/spaces/space-9/start-conversation",
            ]
        );

        let (_, body) = send(router, get_request("/status")).await;
        assert_eq!(body["genie"]["space_id"], "space-9");
    }

    #[tokio::test]
    async fn test_ask_genie_times_out() {
        let api = Arc::new(ScriptedApiClient::new());
        api.push_ok(json!({ "conversation_id": "c-1", "message_id": "m-1" }));
        for _ in 0..30 {
            api.push_ok(json!({ "status": "EXECUTING_QUERY" }));
        }
        let state = connected_state(
            api.clone(),
            Arc::new(ScriptedDriver::new(Vec::new(), "")),
            Some("space-1"),
        );
        let router = build_router(state);

        let (status, body) = send(
            router,
            post_json("/insights/ask", json!({ "question": "Show fraud trends by month" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "timed_out");
        assert_eq!(
            body["notices"][0]["message"],
            "Query timed out. Please try a simpler question."
        );
        assert_eq!(api.requests().len(), 31);
    }
}
