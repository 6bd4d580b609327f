use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use hydrolog_api::{
    ApiConfig, CreateContainerRequest, HydrationApi, LogIntakeRequest, MonthlyStats, StartupReport,
    StatsSummary, WeeklyStats, API_CONTRACT_VERSION,
};
use hydrolog_core::{
    parse_date, AppSettings, Badge, Challenge, Container, ContainerUpdate, HydrationTip,
    SettingsPatch, StatsPeriod, UserChallenge,
};
use hydrolog_vault::{FileSecretStore, IntegrityStatus, IntegrityVerdict};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");

#[derive(Clone)]
struct ServiceState {
    api: Arc<Mutex<HydrationApi<FileSecretStore>>>,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

fn service_error(message: impl Into<String>) -> ServiceError {
    ServiceError { service_contract_version: SERVICE_CONTRACT_VERSION, error: message.into() }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct DateRequest {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MonthlyRequest {
    year: i32,
    month: u8,
}

#[derive(Debug, Clone, Deserialize)]
struct GoalSetRequest {
    goal_amount_ml: u32,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProgressRequest {
    user_challenge_id: i64,
    progress: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct CompleteRequest {
    user_challenge_id: i64,
}

#[derive(Debug, Clone, Serialize)]
struct AmountResponse {
    daily_total_ml: u32,
}

#[derive(Debug, Clone, Serialize)]
struct HourlyResponse {
    hourly_ml: [u32; 24],
}

#[derive(Debug, Clone, Serialize)]
struct StreakResponse {
    streak_days: u32,
}

#[derive(Debug, Clone, Serialize)]
struct GoalResponse {
    daily_goal_ml: u32,
}

#[derive(Debug, Clone, Serialize)]
struct ChangedResponse {
    changed: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ChecksumResponse {
    checksum: String,
}

#[derive(Debug, Parser)]
#[command(name = "hydrolog-service")]
#[command(about = "Local HTTP service for Hydrolog")]
struct Args {
    #[arg(long, default_value = "./hydrolog.sqlite3")]
    db: PathBuf,
    #[arg(long, default_value = "./hydrolog.secrets.json")]
    secrets: PathBuf,
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/openapi", get(openapi))
        .route("/v1/startup", post(startup))
        .route("/v1/db/schema-version", post(db_schema_version))
        .route("/v1/db/reset", post(db_reset))
        .route("/v1/intake/log", post(intake_log))
        .route("/v1/intake/daily-total", post(intake_daily_total))
        .route("/v1/intake/hourly", post(intake_hourly))
        .route("/v1/stats/weekly", get(stats_weekly))
        .route("/v1/stats/monthly", post(stats_monthly))
        .route("/v1/stats/summary/:period", get(stats_summary))
        .route("/v1/stats/streak", get(stats_streak))
        .route("/v1/containers", get(containers_list).post(containers_create))
        .route("/v1/containers/:id/update", post(containers_update))
        .route("/v1/containers/:id/delete", post(containers_delete))
        .route("/v1/settings", get(settings_show))
        .route("/v1/settings/update", post(settings_update))
        .route("/v1/goal", get(goal_show))
        .route("/v1/goal/set", post(goal_set))
        .route("/v1/challenges", get(challenges_list))
        .route("/v1/challenges/mine", get(challenges_mine))
        .route("/v1/challenges/:id/start", post(challenges_start))
        .route("/v1/challenges/progress", post(challenges_progress))
        .route("/v1/challenges/complete", post(challenges_complete))
        .route("/v1/badges", get(badges_list))
        .route("/v1/tips", get(tips_list))
        .route("/v1/tips/:id/read", post(tips_read))
        .route("/v1/integrity/verify", post(integrity_verify))
        .route("/v1/integrity/update", post(integrity_update))
        .route("/v1/integrity/status", get(integrity_status))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut api = HydrationApi::open(&ApiConfig {
        db_path: args.db,
        secrets_path: args.secrets,
        utc_offset: None,
    })?;
    // Startup failures (schema, seeds) are fatal; an integrity mismatch is
    // only reported in the startup report.
    api.initialize()?;

    let state = ServiceState { api: Arc::new(Mutex::new(api)) };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<time::Date>, ServiceError> {
    match raw {
        Some(value) => parse_date(value)
            .map(Some)
            .map_err(|err| service_error(err.to_string())),
        None => Ok(None),
    }
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn startup(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<StartupReport>>, ServiceError> {
    let mut api = state.api.lock().await;
    let report = api.initialize().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(report)))
}

async fn db_schema_version(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<hydrolog_store_sqlite::SchemaStatus>>, ServiceError> {
    let mut api = state.api.lock().await;
    let status = api.schema_status().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(status)))
}

async fn db_reset(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<StartupReport>>, ServiceError> {
    let mut api = state.api.lock().await;
    let report = api.reset_all_data().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(report)))
}

async fn intake_log(
    State(state): State<ServiceState>,
    Json(request): Json<LogIntakeRequest>,
) -> Result<Json<ServiceEnvelope<hydrolog_api::LogIntakeResult>>, ServiceError> {
    let mut api = state.api.lock().await;
    let result = api.log_intake(request).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(result)))
}

async fn intake_daily_total(
    State(state): State<ServiceState>,
    Json(request): Json<DateRequest>,
) -> Result<Json<ServiceEnvelope<AmountResponse>>, ServiceError> {
    let date = parse_optional_date(request.date.as_deref())?;
    let mut api = state.api.lock().await;
    let total = api.daily_total(date).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(AmountResponse { daily_total_ml: total })))
}

async fn intake_hourly(
    State(state): State<ServiceState>,
    Json(request): Json<DateRequest>,
) -> Result<Json<ServiceEnvelope<HourlyResponse>>, ServiceError> {
    let date = parse_optional_date(request.date.as_deref())?;
    let mut api = state.api.lock().await;
    let hourly = api.hourly_breakdown(date).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(HourlyResponse { hourly_ml: hourly })))
}

async fn stats_weekly(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<WeeklyStats>>, ServiceError> {
    let mut api = state.api.lock().await;
    let stats = api.weekly_stats().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(stats)))
}

async fn stats_monthly(
    State(state): State<ServiceState>,
    Json(request): Json<MonthlyRequest>,
) -> Result<Json<ServiceEnvelope<MonthlyStats>>, ServiceError> {
    let mut api = state.api.lock().await;
    let stats = api
        .monthly_stats(request.year, request.month)
        .map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(stats)))
}

async fn stats_summary(
    State(state): State<ServiceState>,
    Path(period): Path<String>,
) -> Result<Json<ServiceEnvelope<StatsSummary>>, ServiceError> {
    let period = StatsPeriod::parse(&period)
        .ok_or_else(|| service_error(format!("invalid period: {period}")))?;
    let mut api = state.api.lock().await;
    let summary = api.stats_summary(period).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(summary)))
}

async fn stats_streak(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<StreakResponse>>, ServiceError> {
    let mut api = state.api.lock().await;
    let streak = api.streak_days().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(StreakResponse { streak_days: streak })))
}

async fn containers_list(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<Container>>>, ServiceError> {
    let mut api = state.api.lock().await;
    let containers = api.list_containers().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(containers)))
}

async fn containers_create(
    State(state): State<ServiceState>,
    Json(request): Json<CreateContainerRequest>,
) -> Result<Json<ServiceEnvelope<Container>>, ServiceError> {
    let mut api = state.api.lock().await;
    let container = api.create_container(request).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(container)))
}

async fn containers_update(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Json(update): Json<ContainerUpdate>,
) -> Result<Json<ServiceEnvelope<ChangedResponse>>, ServiceError> {
    let mut api = state.api.lock().await;
    let changed =
        api.update_container(&id, &update).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(ChangedResponse { changed })))
}

async fn containers_delete(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceEnvelope<ChangedResponse>>, ServiceError> {
    let mut api = state.api.lock().await;
    api.delete_container(&id).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(ChangedResponse { changed: true })))
}

async fn settings_show(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<AppSettings>>, ServiceError> {
    let mut api = state.api.lock().await;
    let settings = api.settings().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(settings)))
}

async fn settings_update(
    State(state): State<ServiceState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<ServiceEnvelope<AppSettings>>, ServiceError> {
    let mut api = state.api.lock().await;
    let merged = api.update_settings(&patch).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(merged)))
}

async fn goal_show(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<GoalResponse>>, ServiceError> {
    let mut api = state.api.lock().await;
    let goal = api.daily_goal(None).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(GoalResponse { daily_goal_ml: goal })))
}

async fn goal_set(
    State(state): State<ServiceState>,
    Json(request): Json<GoalSetRequest>,
) -> Result<Json<ServiceEnvelope<GoalResponse>>, ServiceError> {
    let date = parse_optional_date(request.date.as_deref())?;
    let mut api = state.api.lock().await;
    api.set_daily_goal(date, request.goal_amount_ml)
        .map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(GoalResponse { daily_goal_ml: request.goal_amount_ml })))
}

async fn challenges_list(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<Challenge>>>, ServiceError> {
    let mut api = state.api.lock().await;
    let challenges = api.challenges().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(challenges)))
}

async fn challenges_mine(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<UserChallenge>>>, ServiceError> {
    let mut api = state.api.lock().await;
    let mine = api.user_challenges().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(mine)))
}

async fn challenges_start(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceEnvelope<UserChallenge>>, ServiceError> {
    let mut api = state.api.lock().await;
    let started = api.start_challenge(&id).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(started)))
}

async fn challenges_progress(
    State(state): State<ServiceState>,
    Json(request): Json<ProgressRequest>,
) -> Result<Json<ServiceEnvelope<ChangedResponse>>, ServiceError> {
    let mut api = state.api.lock().await;
    api.update_challenge_progress(request.user_challenge_id, request.progress)
        .map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(ChangedResponse { changed: true })))
}

async fn challenges_complete(
    State(state): State<ServiceState>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<ServiceEnvelope<Badge>>, ServiceError> {
    let mut api = state.api.lock().await;
    let badge = api
        .complete_challenge(request.user_challenge_id)
        .map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(badge)))
}

async fn badges_list(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<Badge>>>, ServiceError> {
    let mut api = state.api.lock().await;
    let badges = api.badges().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(badges)))
}

async fn tips_list(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<Vec<HydrationTip>>>, ServiceError> {
    let mut api = state.api.lock().await;
    let tips = api.tips().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(tips)))
}

async fn tips_read(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceEnvelope<ChangedResponse>>, ServiceError> {
    let mut api = state.api.lock().await;
    api.mark_tip_read(&id).map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(ChangedResponse { changed: true })))
}

async fn integrity_verify(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<IntegrityVerdict>>, ServiceError> {
    let mut api = state.api.lock().await;
    let verdict = api.verify_integrity().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(verdict)))
}

async fn integrity_update(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<ChecksumResponse>>, ServiceError> {
    let mut api = state.api.lock().await;
    let checksum = api.update_checksum().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(ChecksumResponse { checksum })))
}

async fn integrity_status(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<IntegrityStatus>>, ServiceError> {
    let api = state.api.lock().await;
    let status = api.integrity_status().map_err(|err| service_error(err.to_string()))?;
    Ok(Json(envelope(status)))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::body::to_bytes;
    use http::Request;
    use tower::ServiceExt;

    use super::*;

    fn test_state() -> ServiceState {
        let dir = std::env::temp_dir().join(format!("hydrolog-service-{}", ulid::Ulid::new()));
        std::fs::create_dir_all(&dir)
            .unwrap_or_else(|err| panic!("failed to create temp dir {}: {err}", dir.display()));
        let api = HydrationApi::open(&ApiConfig {
            db_path: dir.join("hydrolog.sqlite3"),
            secrets_path: dir.join("hydrolog.secrets.json"),
            utc_offset: None,
        })
        .unwrap_or_else(|err| panic!("failed to open api: {err}"));
        ServiceState { api: Arc::new(Mutex::new(api)) }
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let body = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        };
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => panic!("response body is not JSON: {err}; body={body}"),
        }
    }

    fn get_request(uri: &str) -> Request<axum::body::Body> {
        Request::builder()
            .uri(uri)
            .method("GET")
            .body(axum::body::Body::empty())
            .unwrap_or_else(|err| panic!("failed to build request: {err}"))
    }

    fn post_request(uri: &str, payload: &serde_json::Value) -> Request<axum::body::Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(payload.to_string()))
            .unwrap_or_else(|err| panic!("failed to build request: {err}"))
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let router = app(test_state());

        let response = match router.oneshot(get_request("/v1/health")).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        };
        assert_eq!(response.status(), StatusCode::OK);

        let value = response_json(response).await;
        assert_eq!(
            value.get("service_contract_version").and_then(serde_json::Value::as_str),
            Some(SERVICE_CONTRACT_VERSION)
        );
        assert_eq!(value.pointer("/data/status").and_then(serde_json::Value::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn openapi_endpoint_returns_versioned_artifact() {
        let router = app(test_state());

        let response = match router.oneshot(get_request("/v1/openapi")).await {
            Ok(response) => response,
            Err(err) => panic!("router request failed: {err}"),
        };
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = match to_bytes(response.into_body(), 1024 * 1024).await {
            Ok(bytes) => bytes,
            Err(err) => panic!("failed to read response body: {err}"),
        };
        let body = match String::from_utf8(bytes.to_vec()) {
            Ok(body) => body,
            Err(err) => panic!("response body is not UTF-8: {err}"),
        };
        assert!(body.contains("openapi: 3.1.0"));
        assert!(body.contains("version: service.v1"));
        assert!(body.contains("/v1/intake/log"));
        assert!(body.contains("/v1/integrity/verify"));
    }

    #[tokio::test]
    async fn log_and_read_flow_round_trip() {
        let router = app(test_state());

        let startup = match router.clone().oneshot(post_request("/v1/startup", &serde_json::json!({}))).await
        {
            Ok(response) => response,
            Err(err) => panic!("startup request failed: {err}"),
        };
        assert_eq!(startup.status(), StatusCode::OK);
        let startup_value = response_json(startup).await;
        assert_eq!(
            startup_value.pointer("/data/integrity/is_valid").and_then(serde_json::Value::as_bool),
            Some(true)
        );

        let log = match router
            .clone()
            .oneshot(post_request(
                "/v1/intake/log",
                &serde_json::json!({ "amount_ml": 250, "container_id": "glass-250" }),
            ))
            .await
        {
            Ok(response) => response,
            Err(err) => panic!("log request failed: {err}"),
        };
        assert_eq!(log.status(), StatusCode::OK);
        let log_value = response_json(log).await;
        assert_eq!(
            log_value.pointer("/data/daily_total_ml").and_then(serde_json::Value::as_u64),
            Some(250)
        );

        let total = match router
            .clone()
            .oneshot(post_request("/v1/intake/daily-total", &serde_json::json!({})))
            .await
        {
            Ok(response) => response,
            Err(err) => panic!("daily-total request failed: {err}"),
        };
        let total_value = response_json(total).await;
        assert_eq!(
            total_value.pointer("/data/daily_total_ml").and_then(serde_json::Value::as_u64),
            Some(250)
        );

        let weekly = match router.oneshot(get_request("/v1/stats/weekly")).await {
            Ok(response) => response,
            Err(err) => panic!("weekly request failed: {err}"),
        };
        let weekly_value = response_json(weekly).await;
        assert_eq!(
            weekly_value
                .pointer("/data/series")
                .and_then(serde_json::Value::as_array)
                .map(Vec::len),
            Some(7)
        );
    }

    #[tokio::test]
    async fn invalid_amount_maps_to_bad_request() {
        let router = app(test_state());

        let response = match router
            .oneshot(post_request("/v1/intake/log", &serde_json::json!({ "amount_ml": 0 })))
            .await
        {
            Ok(response) => response,
            Err(err) => panic!("log request failed: {err}"),
        };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = response_json(response).await;
        assert!(value
            .get("error")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|message| message.contains("validation error")));
    }

    #[tokio::test]
    async fn container_create_and_integrity_flow() {
        let router = app(test_state());

        let created = match router
            .clone()
            .oneshot(post_request(
                "/v1/containers",
                &serde_json::json!({
                    "name": "Tumbler",
                    "volume_ml": 600,
                    "kind": "cup-outline",
                    "color": "#112233"
                }),
            ))
            .await
        {
            Ok(response) => response,
            Err(err) => panic!("create request failed: {err}"),
        };
        assert_eq!(created.status(), StatusCode::OK);
        let created_value = response_json(created).await;
        let id = created_value
            .pointer("/data/id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_else(|| panic!("missing container id: {created_value}"))
            .to_string();

        let updated = match router
            .clone()
            .oneshot(post_request(
                &format!("/v1/containers/{id}/update"),
                &serde_json::json!({ "volume_ml": 700 }),
            ))
            .await
        {
            Ok(response) => response,
            Err(err) => panic!("update request failed: {err}"),
        };
        assert_eq!(updated.status(), StatusCode::OK);

        let verdict = match router
            .clone()
            .oneshot(post_request("/v1/integrity/verify", &serde_json::json!({})))
            .await
        {
            Ok(response) => response,
            Err(err) => panic!("verify request failed: {err}"),
        };
        let verdict_value = response_json(verdict).await;
        assert_eq!(
            verdict_value.pointer("/data/is_valid").and_then(serde_json::Value::as_bool),
            Some(true)
        );

        let listed = match router.oneshot(get_request("/v1/containers")).await {
            Ok(response) => response,
            Err(err) => panic!("list request failed: {err}"),
        };
        let listed_value = response_json(listed).await;
        let volumes: Vec<u64> = listed_value
            .pointer("/data")
            .and_then(serde_json::Value::as_array)
            .map(|containers| {
                containers
                    .iter()
                    .filter(|container| {
                        container.get("id").and_then(serde_json::Value::as_str)
                            == Some(id.as_str())
                    })
                    .filter_map(|container| {
                        container.get("volume_ml").and_then(serde_json::Value::as_u64)
                    })
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(volumes, vec![700]);
    }
}
