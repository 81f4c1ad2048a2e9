use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::serve;
use axum::{Json, Router};
use indicatif::ProgressBar;
use piste_router::common::cache::{CachedResort, GraphCache};
use piste_router::common::config::{
    GraphConfig, RouteRequest, ServiceConfig, UserRouteRequest,
};
use piste_router::common::error::Error;
use piste_router::loading::builder::build_graph;
use piste_router::loading::{json, postgres};
use piste_router::routing::destinations::{
    NavigationDestination, list_destinations, search_destinations,
};
use piste_router::routing::planner::{RoutePlan, plan_route};
use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Where resort datasets are read from
#[derive(Clone)]
enum Source {
    Postgres(PgPool),
    Json(PathBuf),
}

#[derive(Clone)]
struct AppState {
    source: Source,
    cache: Arc<Mutex<GraphCache>>,
    config: Arc<GraphConfig>,
}

/// Wraps the crate error so that it can be sent back to the user
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::UnknownSkiArea { .. } => StatusCode::NOT_FOUND,
            Error::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = %self.0, "request failed");
        }

        let json_response = json!({
            "status": "error",
            "message": self.0.to_string()
        });

        (status, Json(json_response)).into_response()
    }
}

/// Fetch a resort and its graph from the cache, loading and building it
/// first if it isn't there yet
async fn get_resort(
    state: &AppState,
    ski_area_id: &str,
) -> Result<Arc<CachedResort>, Error> {
    let cached = state
        .cache
        .lock()
        .map_err(|_| Error::CacheUnavailable)?
        .get(ski_area_id);
    if let Some(resort) = cached {
        return Ok(resort);
    }

    let ski_area = match &state.source {
        Source::Postgres(pool) => {
            postgres::load_ski_area(pool, ski_area_id).await?
        }
        Source::Json(dir) => json::load_ski_area(dir, ski_area_id)?,
    };
    let graph = build_graph(&ski_area, &state.config);

    let mut cache = state.cache.lock().map_err(|_| Error::CacheUnavailable)?;
    Ok(cache.insert(CachedResort { ski_area, graph }))
}

async fn get_route(
    State(state): State<AppState>,
    Json(user_request): Json<UserRouteRequest>,
) -> Result<Json<RoutePlan>, ApiError> {
    let now = Instant::now();

    let request: RouteRequest = user_request.try_into()?;
    let resort = get_resort(&state, &request.ski_area_id).await?;

    let plan =
        plan_route(&resort.graph, &resort.ski_area, &request, &state.config);

    info!(
        ski_area = %request.ski_area_id,
        found = plan.route.is_some(),
        elapsed = ?now.elapsed(),
        "route request complete"
    );

    Ok(Json(plan))
}

#[derive(Deserialize, Debug)]
struct DestinationQuery {
    ski_area_id: String,
    q: Option<String>,
}

async fn get_destinations(
    State(state): State<AppState>,
    Query(query): Query<DestinationQuery>,
) -> Result<Json<Vec<NavigationDestination>>, ApiError> {
    let resort = get_resort(&state, &query.ski_area_id).await?;

    let destinations = list_destinations(&resort.graph, &resort.ski_area);
    let destinations = match query.q.as_deref() {
        Some(q) => search_destinations(&destinations, q)?,
        None => destinations,
    };

    Ok(Json(destinations))
}

async fn health_check() -> impl IntoResponse {
    let json_response = json!({
        "status": "success",
        "message": "Ready to route"
    });

    Json(json_response)
}

/// Log to stdout, at the level set by RUST_LOG (info if not set)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build graphs for the requested ski areas ahead of the first request.
/// Failures are logged and skipped, the ski area will be loaded on demand.
async fn preload(state: &AppState, ski_area_ids: &[String]) {
    if ski_area_ids.is_empty() {
        return;
    }

    let bar = ProgressBar::new(ski_area_ids.len() as u64);
    for ski_area_id in ski_area_ids {
        if let Err(err) = get_resort(state, ski_area_id).await {
            warn!(ski_area = %ski_area_id, error = %err, "preload failed");
        }
        bar.inc(1);
    }
    bar.finish();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let service_config = ServiceConfig::from_env()?;
    let graph_config = GraphConfig::from_env()?;

    let source = match &service_config.dataset_dir {
        Some(dir) => Source::Json(PathBuf::from(dir)),
        None => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&service_config.database_url)
                .await?;
            Source::Postgres(pool)
        }
    };

    let state = AppState {
        source,
        cache: Arc::new(Mutex::new(GraphCache::new(
            service_config.graph_cache_size,
        ))),
        config: Arc::new(graph_config),
    };

    preload(&state, &service_config.preload).await;

    let router = Router::new()
        .route("/healthcheck", get(health_check))
        .route("/route", post(get_route))
        .route("/destinations", get(get_destinations))
        .with_state(state);

    let listener =
        tokio::net::TcpListener::bind(&service_config.bind_addr).await?;
    info!(addr = %service_config.bind_addr, "listening");
    serve(listener, router).await?;

    Ok(())
}
