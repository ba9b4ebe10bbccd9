//! HTTP service: routes and request handlers

use crate::app_state::{AppState, SharedAppState};
use crate::catalogue::{self, SearchPage};
use crate::cli::CommandLineArgs;
use crate::cube::{Cell, Cube, Selection};
use crate::error::StatCubeError;
use crate::metrics;
use crate::models;
use crate::rpc;
use crate::series::{self, ChartData};
use crate::table::{self, Table, TablePage};
use crate::validated_json::ValidatedJson;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::{Layer, ServiceBuilder};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::{event, Level};

/// Name of the file offered by CSV exports
const CSV_FILENAME: &str = "table_data.csv";

/// Service identity returned by the schema endpoint
const SCHEMA: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// `Service` type for the application.
pub type Service = NormalizePath<Router>;

/// Initialise the application.
///
/// Configures the global Rayon thread pool when Rayon is enabled.
pub fn init(args: &CommandLineArgs) -> Result<(), rayon::ThreadPoolBuildError> {
    if args.use_rayon {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(thread_limit) = args.thread_limit {
            builder = builder.num_threads(thread_limit);
        }
        builder.build_global()?;
        event!(
            Level::INFO,
            "using Rayon with {} threads",
            rayon::current_num_threads()
        );
    }
    Ok(())
}

/// Returns a [axum::Router] for the statcube API.
///
/// The router is populated with all routes as well as the following middleware:
///
/// * a [tower_http::trace::TraceLayer] for tracing requests and responses and recording request
///   metrics
fn router(args: &CommandLineArgs) -> Router {
    let state: SharedAppState = Arc::new(AppState::new(args));

    fn v1() -> Router<SharedAppState> {
        Router::new()
            .route("/flatten", post(flatten))
            .route("/cell", post(cell))
            .route("/series", post(chart_series))
            .route("/table", post(table_page))
            .route("/csv", post(csv))
            .route("/query", post(query))
            .route("/search", post(search))
            .layer(
                ServiceBuilder::new().layer(
                    TraceLayer::new_for_http()
                        .on_request(metrics::request_counter)
                        .on_response(metrics::record_response_metrics),
                ),
            )
    }

    Router::new()
        .route("/.well-known/statcube-schema", get(schema))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/v1", v1())
        .with_state(state)
}

/// Returns a [crate::app::Service] for the statcube API.
///
/// The service is populated with all routes as well as the following middleware:
///
/// * a [tower_http::normalize_path::NormalizePath] layer for trimming trailing slashes from
///   requests
pub fn service(args: &CommandLineArgs) -> Service {
    NormalizePathLayer::trim_trailing_slash().layer(router(args))
}

/// Returns the service identity.
async fn schema() -> &'static str {
    SCHEMA
}

/// Run a CPU-bound transformation, on the Rayon thread pool if enabled.
async fn run<T, F>(state: &AppState, work: F) -> Result<T, StatCubeError>
where
    F: FnOnce() -> Result<T, StatCubeError> + Send + 'static,
    T: Send + 'static,
{
    if state.args.use_rayon {
        tokio_rayon::spawn(work).await
    } else {
        work()
    }
}

/// Convert a dataset payload into a cube, if its number of cells is within the configured limit.
fn checked_cube(state: &AppState, dataset: models::DatasetPayload) -> Result<Cube, StatCubeError> {
    dataset.into_checked_cube(|count| state.resource_manager.cells(count))
}

/// Returns the sub-cube of an optional selection.
fn select(cube: Cube, selection: Option<&Selection>) -> Result<Cube, StatCubeError> {
    match selection {
        Some(selection) => cube.select(selection),
        None => Ok(cube),
    }
}

/// Flatten a dataset into rows
///
/// # Arguments
///
/// * `state`: Shared application state
/// * `request`: Dataset and optional selection
async fn flatten(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::FlattenRequest>,
) -> Result<Json<models::FlattenResponse>, StatCubeError> {
    let cube = checked_cube(&state, request.dataset)?;
    let _task_permit = state.resource_manager.task().await?;
    let selection = request.selection;
    let response = run(&state, move || {
        let cube = select(cube, selection.as_ref())?;
        let rows = cube.flatten()?;
        metrics::record_rows(rows.len());
        Ok(models::FlattenResponse {
            columns: table::columns(&cube)?,
            rows,
        })
    })
    .await?;
    Ok(Json(response))
}

/// Read a single cell of a dataset
async fn cell(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::CellRequest>,
) -> Result<Json<Cell>, StatCubeError> {
    let cube = checked_cube(&state, request.dataset)?;
    let _task_permit = state.resource_manager.task().await?;
    Ok(Json(cube.cell(&request.coordinates)?))
}

/// Extract chart series from a dataset
async fn chart_series(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::SeriesRequest>,
) -> Result<Json<ChartData>, StatCubeError> {
    let cube = checked_cube(&state, request.dataset)?;
    let _task_permit = state.resource_manager.task().await?;
    let chart = request.chart;
    let data = run(&state, move || series::extract(&cube, &chart)).await?;
    Ok(Json(data))
}

/// Build a table from a request, checking resources.
async fn build_table(
    state: &AppState,
    request: models::TableRequest,
) -> Result<(Table, models::TableQuery), StatCubeError> {
    let cube = checked_cube(state, request.dataset)?;
    let selection = request.selection;
    let table = run(state, move || {
        let table = Table::new(&select(cube, selection.as_ref())?)?;
        metrics::record_rows(table.len());
        Ok(table)
    })
    .await?;
    Ok((table, request.query))
}

/// Return a page of the flattened table of a dataset
async fn table_page(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::TableRequest>,
) -> Result<Json<TablePage>, StatCubeError> {
    let _task_permit = state.resource_manager.task().await?;
    let (table, query) = build_table(&state, request).await?;
    Ok(Json(table.page(&query)?))
}

/// Export the flattened table of a dataset as CSV
async fn csv(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::TableRequest>,
) -> Result<Response, StatCubeError> {
    let _task_permit = state.resource_manager.task().await?;
    let (table, query) = build_table(&state, request).await?;
    let body = table.to_csv(&query)?;
    Ok((
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", CSV_FILENAME),
            ),
        ],
        body,
    )
        .into_response())
}

/// Build a data API request for a dataset, its metadata or the catalogue
async fn query(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::QueryRequest>,
) -> Json<models::QueryResponse> {
    let language = request
        .language
        .unwrap_or_else(|| state.args.language.clone());
    // Validation guarantees the members each kind needs.
    let matrix = request.matrix.unwrap_or_default();
    let rpc_request = match request.kind {
        models::QueryKind::Dataset => models::RpcRequest::Dataset(rpc::read_dataset(
            &matrix,
            &request.selection.unwrap_or_default(),
            &language,
        )),
        models::QueryKind::Metadata => {
            models::RpcRequest::Metadata(rpc::read_metadata(&matrix, &language))
        }
        models::QueryKind::Search => models::RpcRequest::Search(rpc::search(
            request.search.as_deref().unwrap_or_default(),
            &language,
        )),
        models::QueryKind::Themes => models::RpcRequest::Themes(rpc::read_themes(&language)),
        models::QueryKind::Organisations => {
            models::RpcRequest::Organisations(rpc::read_organisations())
        }
    };
    Json(models::QueryResponse {
        endpoint: rpc::endpoint(&state.args.api_base_url),
        request: rpc_request,
    })
}

/// Facet, filter and order the results of a catalogue search
async fn search(
    ValidatedJson(request): ValidatedJson<models::SearchRequest>,
) -> Result<Json<SearchPage>, StatCubeError> {
    let results = request.results.into_results()?;
    Ok(Json(catalogue::search_page(results, &request.filter)))
}
