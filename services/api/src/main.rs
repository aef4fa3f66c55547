//! API Service - read-only report queries over the CVM compensation dataset
//!
//! Endpoints:
//! - GET  /health                       - Health check
//! - GET  /dataset                      - Load status of the cached dataset
//! - POST /dataset/reload               - Refetch and renormalize the source
//! - GET  /filters                      - Values for the global filters
//! - GET  /reports/components           - Pay composition per governing body
//! - GET  /reports/components/evolution - Component history of one body
//! - GET  /reports/components/ranking   - Companies ranked by a component
//! - GET  /reports/bonus                - Bonus / PLR plan evolution
//! - GET  /reports/bonus/ranking        - Companies ranked by a bonus metric
//! - GET  /reports/equity/ranking       - Companies ranked by share-based pay
//! - GET  /reports/individual           - Max / mean / min individual pay
//! - GET  /reports/individual/ranking   - Companies ranked by individual pay
//! - GET  /reports/sector-stats         - Quartile statistics per sector
//! - GET  /reports/benchmark            - Peer benchmark with projection
//! - GET  /reports/pay-slice            - Executive pay dispersion
//! - GET  /reports/governance/board-balance - Executive board vs board of directors
//! - GET  /reports/governance/severance - Termination pay above 1% of the total
//!
//! Every report accepts the global filter (`uf`, `setor`, `controle`).

mod reports;

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use cvm_collector::{CacheEntry, Config, Dataset, DatasetCache, DatasetState};
use reports::{Basis, GlobalFilter, ReportError, DEFAULT_LIMIT, EQUITY_RANKING_LIMIT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

const MAX_LIMIT: usize = 100;

// ============================================================================
// State
// ============================================================================

struct AppState {
    cache: RwLock<DatasetCache>,
    client: reqwest::Client,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
enum ApiError {
    /// No canonical table could be produced.
    Unavailable(String),
    BadRequest(String),
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Unavailable(reason) if reason.starts_with("no data available") => {
                (StatusCode::SERVICE_UNAVAILABLE, reason)
            }
            ApiError::Unavailable(reason) => {
                (StatusCode::SERVICE_UNAVAILABLE, format!("no data available: {}", reason))
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

/// `Query` whose rejection is the JSON error body instead of plain text.
struct ApiQuery<T>(T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ApiQuery(value))
    }
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct DatasetInfo {
    load_id: Uuid,
    source: String,
    status: &'static str,
    loaded_at: DateTime<Utc>,
    checked_at: DateTime<Utc>,
    content_hash: Option<String>,
    size_bytes: Option<usize>,
    rows: usize,
    encoding: Option<&'static str>,
    passthrough: Vec<String>,
    warnings: Vec<String>,
    coerced_cells: usize,
    invalid_years: usize,
    failure: Option<String>,
}

impl From<&CacheEntry> for DatasetInfo {
    fn from(entry: &CacheEntry) -> Self {
        let mut info = DatasetInfo {
            load_id: entry.load_id,
            source: entry.source.to_string(),
            status: "failed",
            loaded_at: entry.loaded_at,
            checked_at: entry.checked_at,
            content_hash: None,
            size_bytes: None,
            rows: 0,
            encoding: None,
            passthrough: Vec::new(),
            warnings: Vec::new(),
            coerced_cells: 0,
            invalid_years: 0,
            failure: entry.failure().map(|r| r.to_string()),
        };
        if let DatasetState::Ready(dataset) = &entry.state {
            let report = &dataset.report;
            info.status = "ready";
            info.content_hash = Some(dataset.identity.content_hash.clone());
            info.size_bytes = Some(dataset.size_bytes);
            info.rows = dataset.table.len();
            info.encoding = report.encoding;
            info.passthrough = report.passthrough.clone();
            info.warnings = report.warnings.iter().map(|w| w.to_string()).collect();
            info.coerced_cells = report.coerced_cells;
            info.invalid_years = report.invalid_years;
        }
        info
    }
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize)]
struct ComponentsQuery {
    empresa: String,
    ano: i32,
}

#[derive(Deserialize)]
struct CompanyBodyQuery {
    empresa: String,
    orgao: String,
    #[serde(default)]
    basis: Basis,
}

#[derive(Deserialize)]
struct BonusRankingQuery {
    ano: i32,
    metric: String,
    #[serde(default)]
    basis: Basis,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ComponentRankingQuery {
    ano: i32,
    orgao: String,
    /// Defaults to the body total
    metric: Option<String>,
    #[serde(default)]
    basis: Basis,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct EquityRankingQuery {
    ano: i32,
    #[serde(default)]
    basis: Basis,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct IndividualRankingQuery {
    ano: i32,
    orgao: String,
    metric: String,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SectorStatsQuery {
    ano: i32,
    orgao: String,
    metric: String,
    #[serde(default)]
    basis: Basis,
}

#[derive(Deserialize)]
struct BenchmarkQuery {
    empresa: String,
    orgao: String,
    /// Comma-separated company names
    peers: Option<String>,
    adjustment_pct: Option<f64>,
}

#[derive(Deserialize)]
struct YearQuery {
    ano: i32,
    limit: Option<usize>,
}

/// Labels in the canonical table are trimmed and upper-cased.
fn label_param(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn limit_param(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

// ============================================================================
// Handlers
// ============================================================================

/// The cached entry, fetched again when `force` is set or nothing is cached.
/// The fetch runs outside the lock; readers keep the previous entry meanwhile.
async fn load_entry(state: &AppState, force: bool) -> Arc<CacheEntry> {
    let location = {
        let cache = state.cache.read().await;
        match cache.current() {
            Some(entry) if !force => return entry,
            _ => cache.location().clone(),
        }
    };
    let fetched = cvm_collector::fetch_source(&state.client, &location).await;

    let mut cache = state.cache.write().await;
    if !force {
        // another request finished the first load while this one fetched
        if let Some(entry) = cache.current() {
            return entry;
        }
    }
    cache.install(fetched)
}

/// The cached entry, loading it on first use.
async fn current_entry(state: &AppState) -> Arc<CacheEntry> {
    load_entry(state, false).await
}

async fn dataset(state: &AppState) -> Result<Arc<Dataset>, ApiError> {
    let entry = current_entry(state).await;
    match &entry.state {
        DatasetState::Ready(dataset) => Ok(dataset.clone()),
        DatasetState::Failed { reason } => {
            tracing::warn!(load_id = %entry.load_id, reason = %reason, "report requested without data");
            Err(ApiError::Unavailable(reason.clone()))
        }
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn dataset_handler(State(state): State<Arc<AppState>>) -> Json<DatasetInfo> {
    let entry = current_entry(&state).await;
    Json(DatasetInfo::from(entry.as_ref()))
}

async fn reload_handler(State(state): State<Arc<AppState>>) -> Json<DatasetInfo> {
    let entry = load_entry(&state, true).await;
    tracing::info!(load_id = %entry.load_id, failed = entry.failure().is_some(), "dataset reload requested");
    Json(DatasetInfo::from(entry.as_ref()))
}

async fn filters_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let dataset = dataset(&state).await?;
    let options = reports::filter_options(&dataset.table.all());
    Ok(Json(json!(options)))
}

async fn components_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<ComponentsQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());
    let empresa = label_param(&params.empresa);

    let bodies = reports::component_breakdown(&selection, &empresa, params.ano);
    Ok(Json(json!({ "empresa": empresa, "ano": params.ano, "bodies": bodies })))
}

async fn component_evolution_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<CompanyBodyQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());
    let empresa = label_param(&params.empresa);
    let orgao = label_param(&params.orgao);

    let years = reports::component_evolution(&selection, &empresa, &orgao, params.basis);
    Ok(Json(json!({
        "empresa": empresa,
        "orgao": orgao,
        "basis": params.basis,
        "years": years,
    })))
}

async fn component_ranking_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<ComponentRankingQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());
    let orgao = label_param(&params.orgao);
    let metric = label_param(params.metric.as_deref().unwrap_or("TOTAL_REMUNERACAO_ORGAO"));

    let ranking = reports::component_ranking(
        &selection,
        params.ano,
        &orgao,
        &metric,
        params.basis,
        limit_param(params.limit, DEFAULT_LIMIT),
    )?;
    Ok(Json(json!({
        "ano": params.ano,
        "orgao": orgao,
        "metric": metric,
        "basis": params.basis,
        "companies": ranking,
    })))
}

async fn bonus_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<CompanyBodyQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());
    let empresa = label_param(&params.empresa);
    let orgao = label_param(&params.orgao);

    let years = reports::bonus_evolution(&selection, &empresa, &orgao, params.basis);
    Ok(Json(json!({
        "empresa": empresa,
        "orgao": orgao,
        "basis": params.basis,
        "years": years,
    })))
}

async fn bonus_ranking_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<BonusRankingQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());
    let metric = label_param(&params.metric);

    let ranking = reports::bonus_ranking(&selection, params.ano, &metric, params.basis, limit_param(params.limit, DEFAULT_LIMIT))?;
    Ok(Json(json!({
        "ano": params.ano,
        "metric": metric,
        "basis": params.basis,
        "companies": ranking,
    })))
}

async fn equity_ranking_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<EquityRankingQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());

    let ranking =
        reports::equity_ranking(&selection, params.ano, params.basis, limit_param(params.limit, EQUITY_RANKING_LIMIT));
    Ok(Json(json!({
        "ano": params.ano,
        "basis": params.basis,
        "companies": ranking,
    })))
}

async fn individual_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<CompanyBodyQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());
    let empresa = label_param(&params.empresa);
    let orgao = label_param(&params.orgao);

    let years = reports::individual_evolution(&selection, &empresa, &orgao);
    Ok(Json(json!({ "empresa": empresa, "orgao": orgao, "years": years })))
}

async fn individual_ranking_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<IndividualRankingQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());
    let orgao = label_param(&params.orgao);
    let metric = label_param(&params.metric);

    let ranking = reports::individual_ranking(&selection, params.ano, &orgao, &metric, limit_param(params.limit, DEFAULT_LIMIT))?;
    Ok(Json(json!({
        "ano": params.ano,
        "orgao": orgao,
        "metric": metric,
        "companies": ranking,
    })))
}

async fn sector_stats_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<SectorStatsQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());
    let orgao = label_param(&params.orgao);
    let metric = label_param(&params.metric);

    let stats = reports::sector_statistics(&selection, params.ano, &orgao, &metric, params.basis)?;
    Ok(Json(json!({ "ano": params.ano, "orgao": orgao, "statistics": stats })))
}

async fn benchmark_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<BenchmarkQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());
    let empresa = label_param(&params.empresa);
    let orgao = label_param(&params.orgao);
    let peers: Vec<String> = params
        .peers
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(label_param)
        .filter(|p| !p.is_empty())
        .collect();

    let benchmark =
        reports::peer_benchmark(&selection, &empresa, &orgao, &peers, params.adjustment_pct.unwrap_or(5.0))?;
    Ok(Json(json!({ "empresa": empresa, "benchmark": benchmark })))
}

async fn pay_slice_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<YearQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());

    let slice = reports::pay_slice(&selection, params.ano, limit_param(params.limit, DEFAULT_LIMIT));
    Ok(Json(json!(slice)))
}

async fn board_balance_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<YearQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());

    let balance = reports::board_balance(&selection, params.ano);
    Ok(Json(json!(balance)))
}

async fn severance_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<GlobalFilter>,
    ApiQuery(params): ApiQuery<YearQuery>,
) -> ApiResult {
    let dataset = dataset(&state).await?;
    let selection = filter.apply(&dataset.table.all());

    let flagged = reports::severance_radar(&selection, params.ano, limit_param(params.limit, DEFAULT_LIMIT));
    Ok(Json(json!({ "ano": params.ano, "companies": flagged })))
}

// ============================================================================
// Main
// ============================================================================

fn app(state: Arc<AppState>) -> Router {
    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/dataset", get(dataset_handler))
        .route("/dataset/reload", post(reload_handler))
        .route("/filters", get(filters_handler))
        .route("/reports/components", get(components_handler))
        .route("/reports/components/evolution", get(component_evolution_handler))
        .route("/reports/components/ranking", get(component_ranking_handler))
        .route("/reports/bonus", get(bonus_handler))
        .route("/reports/bonus/ranking", get(bonus_ranking_handler))
        .route("/reports/equity/ranking", get(equity_ranking_handler))
        .route("/reports/individual", get(individual_handler))
        .route("/reports/individual/ranking", get(individual_ranking_handler))
        .route("/reports/sector-stats", get(sector_stats_handler))
        .route("/reports/benchmark", get(benchmark_handler))
        .route("/reports/pay-slice", get(pay_slice_handler))
        .route("/reports/governance/board-balance", get(board_balance_handler))
        .route("/reports/governance/severance", get(severance_handler))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    cvm_parser::logging::init("cvm_api=info,cvm_collector=info,cvm_parser=warn");
    let config = Config::from_env()?;

    println!("=== CVM Compensation API ===");
    println!("Source: {}", config.data_source);

    let client = config.http_client()?;
    let mut cache = DatasetCache::new(config.data_source.clone());

    // Warm the cache; a failure is served as 503 until /dataset/reload.
    let entry = cache.get_or_load(&client).await;
    match &entry.state {
        DatasetState::Ready(dataset) => println!("Dataset loaded: {} rows", dataset.table.len()),
        DatasetState::Failed { reason } => println!("Dataset unavailable: {}", reason),
    }

    let state = Arc::new(AppState {
        cache: RwLock::new(cache),
        client,
    });

    println!("API listening on http://{}", config.api_bind);
    println!("\nEndpoints:");
    println!("  GET  /health");
    println!("  GET  /dataset");
    println!("  POST /dataset/reload");
    println!("  GET  /filters");
    println!("  GET  /reports/components?empresa=&ano=");
    println!("  GET  /reports/components/evolution?empresa=&orgao=&basis=");
    println!("  GET  /reports/components/ranking?ano=&orgao=&metric=&basis=&limit=");
    println!("  GET  /reports/bonus?empresa=&orgao=&basis=");
    println!("  GET  /reports/bonus/ranking?ano=&metric=&basis=&limit=");
    println!("  GET  /reports/equity/ranking?ano=&basis=&limit=");
    println!("  GET  /reports/individual?empresa=&orgao=");
    println!("  GET  /reports/individual/ranking?ano=&orgao=&metric=&limit=");
    println!("  GET  /reports/sector-stats?ano=&orgao=&metric=&basis=");
    println!("  GET  /reports/benchmark?empresa=&orgao=&peers=&adjustment_pct=");
    println!("  GET  /reports/pay-slice?ano=&limit=");
    println!("  GET  /reports/governance/board-balance?ano=");
    println!("  GET  /reports/governance/severance?ano=&limit=");
    println!("  (all reports: &uf=&setor=&controle=)");

    let listener = tokio::net::TcpListener::bind(&config.api_bind).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use cvm_collector::{FetchError, RawArtifact, SourceLocation};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const SAMPLE: &str = "DENOM_CIA,Ano do Exercício Social,Orgao_Administracao,SETOR,UF_SEDE,SALARIO,\
                          BONUS_VALOR_EFETIVO,QTD_MEMBROS_REMUNERADOS_VARIAVEL\n\
                          acme,2023,diretoria,energia,sp,1000,300,3\n\
                          beta,2023,diretoria,bancos,rj,2000,100,1\n\
                          acme,2022,diretoria,energia,sp,900,0,3\n";

    fn state_with(fetched: Result<RawArtifact, FetchError>) -> Arc<AppState> {
        let location = SourceLocation::parse("dados.csv");
        let mut cache = DatasetCache::new(location);
        cache.install(fetched);
        Arc::new(AppState {
            cache: RwLock::new(cache),
            client: reqwest::Client::new(),
        })
    }

    fn ready_state() -> Arc<AppState> {
        let artifact = RawArtifact::from_bytes(SourceLocation::parse("dados.csv"), SAMPLE.as_bytes().to_vec(), None);
        state_with(Ok(artifact))
    }

    async fn call(state: Arc<AppState>, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app(state)
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
        call(state, "GET", uri).await
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(ready_state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_dataset_info() {
        let (status, body) = get_json(ready_state(), "/dataset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["rows"], 3);
        assert!(body["content_hash"].as_str().unwrap().starts_with("sha256:"));
    }

    #[tokio::test]
    async fn test_filters() {
        let (status, body) = get_json(ready_state(), "/filters").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["years"], json!([2023, 2022]));
        assert_eq!(body["ufs"], json!(["RJ", "SP"]));
    }

    #[tokio::test]
    async fn test_components_report() {
        let (status, body) = get_json(ready_state(), "/reports/components?empresa=acme&ano=2023").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["empresa"], "ACME");
        assert_eq!(body["bodies"][0]["orgao"], "DIRETORIA");
        assert_eq!(body["bodies"][0]["total"], 1000.0);
    }

    #[tokio::test]
    async fn test_unknown_company_is_an_empty_report() {
        let (status, body) = get_json(ready_state(), "/reports/components?empresa=nope&ano=2023").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bodies"], json!([]));
    }

    #[tokio::test]
    async fn test_global_filter_applies_to_rankings() {
        let (_, all) = get_json(ready_state(), "/reports/bonus/ranking?ano=2023&metric=bonus_pago").await;
        assert_eq!(all["companies"][0]["company"], "ACME");
        assert_eq!(all["companies"].as_array().unwrap().len(), 2);

        let (status, rj) = get_json(ready_state(), "/reports/bonus/ranking?ano=2023&metric=BONUS_PAGO&uf=rj").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rj["companies"], json!([{ "company": "BETA", "value": 100.0 }]));
    }

    #[tokio::test]
    async fn test_per_member_basis() {
        let (status, body) =
            get_json(ready_state(), "/reports/bonus/ranking?ano=2023&metric=BONUS_PAGO&basis=per_member").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["companies"][0]["company"], "ACME");
        assert_eq!(body["companies"][0]["value"], 100.0);
        assert_eq!(body["companies"][0]["members"], 3.0);
    }

    #[tokio::test]
    async fn test_unknown_metric_is_bad_request() {
        let (status, body) = get_json(ready_state(), "/reports/bonus/ranking?ano=2023&metric=SALARIO").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("unknown metric"));
    }

    #[tokio::test]
    async fn test_missing_parameter_is_bad_request() {
        let (status, body) = get_json(ready_state(), "/reports/components?empresa=acme").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("missing field"));
    }

    #[tokio::test]
    async fn test_malformed_parameter_is_a_json_error() {
        let (status, body) = get_json(ready_state(), "/reports/equity/ranking?ano=2023&basis=per_head").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = get_json(ready_state(), "/reports/pay-slice?ano=last").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("query string"));
    }

    #[tokio::test]
    async fn test_component_reports() {
        let (status, body) = get_json(
            ready_state(),
            "/reports/components/ranking?ano=2023&orgao=diretoria&metric=rem_fixa_salario",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metric"], "REM_FIXA_SALARIO");
        assert_eq!(
            body["companies"],
            json!([{ "company": "BETA", "value": 2000.0 }, { "company": "ACME", "value": 1000.0 }])
        );

        let (status, body) =
            get_json(ready_state(), "/reports/components/evolution?empresa=acme&orgao=diretoria").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["years"][0]["ano"], 2022);
        assert_eq!(body["years"][0]["total"], 900.0);
        assert_eq!(body["years"][1]["total"], 1000.0);

        // no headcount disclosed, so nothing to divide by
        let (_, body) = get_json(
            ready_state(),
            "/reports/components/evolution?empresa=acme&orgao=diretoria&basis=per_member",
        )
        .await;
        assert_eq!(body["years"], json!([]));
    }

    #[tokio::test]
    async fn test_governance_reports_without_data_are_empty() {
        let (status, body) = get_json(ready_state(), "/reports/governance/board-balance?ano=2023").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["companies"], json!([]));
        assert_eq!(body["ratio"], Value::Null);

        let (status, body) = get_json(ready_state(), "/reports/governance/severance?ano=2023").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["companies"], json!([]));

        let (status, body) = get_json(ready_state(), "/reports/equity/ranking?ano=2023").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["companies"], json!([]));
    }

    #[tokio::test]
    async fn test_adjustment_out_of_range_is_bad_request() {
        let (status, _) = get_json(
            ready_state(),
            "/reports/benchmark?empresa=acme&orgao=diretoria&peers=beta&adjustment_pct=500",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_benchmark() {
        let (status, body) = get_json(
            ready_state(),
            "/reports/benchmark?empresa=acme&orgao=diretoria&peers=beta&adjustment_pct=10",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["benchmark"]["years"], json!([2022, 2023, 2024]));
        assert_eq!(body["benchmark"]["series"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_load_is_service_unavailable() {
        let state = state_with(Err(FetchError::NotTabular {
            content_type: "text/html".to_string(),
        }));
        let (status, body) = get_json(state.clone(), "/reports/pay-slice?ano=2023").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().starts_with("no data available"));

        let (status, info) = get_json(state, "/dataset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(info["status"], "failed");
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dados.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let state = Arc::new(AppState {
            cache: RwLock::new(DatasetCache::new(SourceLocation::Path(path.clone()))),
            client: reqwest::Client::new(),
        });

        let (_, first) = call(state.clone(), "POST", "/dataset/reload").await;
        assert_eq!(first["rows"], 3);

        std::fs::write(&path, format!("{}gama,2023,conselho,bancos,sp,50,0,0\n", SAMPLE)).unwrap();
        let (status, second) = call(state.clone(), "POST", "/dataset/reload").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["rows"], 4);
        assert_ne!(first["load_id"], second["load_id"]);

        let (_, filters) = get_json(state, "/filters").await;
        assert_eq!(filters["orgaos"], json!(["CONSELHO", "DIRETORIA"]));
    }

    #[tokio::test]
    async fn test_reports_are_served_while_a_reload_is_in_flight() {
        // accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut cache = DatasetCache::new(SourceLocation::Url(format!("http://{}/dados.csv", addr)));
        cache.install(Ok(RawArtifact::from_bytes(
            SourceLocation::parse("dados.csv"),
            SAMPLE.as_bytes().to_vec(),
            None,
        )));
        let state = Arc::new(AppState {
            cache: RwLock::new(cache),
            client: reqwest::Client::new(),
        });

        let reload = tokio::spawn(call(state.clone(), "POST", "/dataset/reload"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (status, body) = tokio::time::timeout(Duration::from_secs(1), get_json(state, "/filters"))
            .await
            .expect("report blocked behind the reload");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["years"], json!([2023, 2022]));
        assert!(!reload.is_finished());

        reload.abort();
        drop(listener);
    }
}
