//! Request and response data types

use crate::catalogue::SearchResult;
use crate::cube::{Cube, Row, Selection};
use crate::error::StatCubeError;
use crate::jsonstat::Dataset;
use crate::rpc;
use crate::table::Column;

use hashbrown::HashMap;
use serde::{de, Deserialize, Deserializer, Serialize};
use strum_macros::Display;
use time::{format_description::FormatItem, macros::format_description, Date};
use url::Url;
use validator::{Validate, ValidationError};

/// A JSON-stat dataset, either bare or as returned by the data API inside a JSON-RPC response
/// envelope.
// NOTE: Every member of a bare dataset is optional, so the envelope variant must come first.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DatasetPayload {
    /// JSON-RPC response wrapping a dataset
    Envelope(rpc::Response<Dataset>),
    /// Bare JSON-stat dataset
    Bare(Dataset),
}

impl DatasetPayload {
    /// Unwrap the payload into a dataset.
    pub fn into_dataset(self) -> Result<Dataset, StatCubeError> {
        match self {
            DatasetPayload::Envelope(response) => response.into_result(),
            DatasetPayload::Bare(dataset) => Ok(dataset),
        }
    }

    /// Unwrap the payload and convert it into a validated [Cube] once `check_cells` has accepted
    /// its number of cells.
    pub fn into_checked_cube<F>(self, check_cells: F) -> Result<Cube, StatCubeError>
    where
        F: FnOnce(usize) -> Result<(), StatCubeError>,
    {
        self.into_dataset()?.into_cube(check_cells)
    }
}

/// Request data for flattening a dataset into rows
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct FlattenRequest {
    /// The dataset to flatten
    pub dataset: DatasetPayload,
    /// Optional subset of categories to flatten
    pub selection: Option<Selection>,
}

/// Response to a flatten request
#[derive(Debug, Serialize)]
pub struct FlattenResponse {
    /// Table columns, dimensions first and the value last
    pub columns: Vec<Column>,
    /// One row per cell
    pub rows: Vec<Row>,
}

/// Request data for reading a single cell
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct CellRequest {
    /// The dataset to read from
    pub dataset: DatasetPayload,
    /// Category code of the cell in every dimension
    pub coordinates: HashMap<String, String>,
}

/// Chart types
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Pie,
    Doughnut,
    Radar,
}

impl ChartType {
    /// Whether the chart is drawn on x and y axes.
    pub fn has_axes(self) -> bool {
        matches!(self, ChartType::Bar | ChartType::Line)
    }
}

/// Position of the chart legend
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LegendPosition {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
}

/// One plotted series
#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct SeriesConfig {
    /// Legend label. Defaults to the label of the series category.
    pub label: Option<String>,
    /// Dimension the series is drawn from
    #[validate(length(min = 1, message = "series dimension must not be empty"))]
    pub dimension: String,
    /// Category code of the series. Defaults to the first category.
    pub code: Option<String>,
    /// Identifier of the y axis the series is drawn against
    pub y_axis: Option<String>,
}

/// Chart configuration
#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_chart_config"))]
pub struct ChartConfig {
    /// Chart type
    #[serde(default, rename = "type")]
    pub chart_type: ChartType,
    /// Chart title
    pub title: Option<String>,
    /// Dimension along the x axis
    #[validate(length(min = 1, message = "x axis dimension must not be empty"))]
    pub x_axis_dimension: String,
    /// Category codes along the x axis. Empty means every category.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Plotted series
    #[validate]
    pub series: Vec<SeriesConfig>,
    /// Category codes pinning the dimensions that are neither plotted nor a series
    #[serde(default)]
    pub fixed: HashMap<String, String>,
    /// X axis title
    pub x_axis_label: Option<String>,
    /// Y axis title
    pub y_axis_label: Option<String>,
    /// Whether series may use a second y axis
    #[serde(default)]
    pub dual_axis: bool,
    /// Whether series are stacked
    #[serde(default)]
    pub stacked: bool,
    /// Whether the y axis scales to the data rather than starting at zero
    #[serde(default = "default_true")]
    pub auto_scale: bool,
    /// Legend position
    #[serde(default)]
    pub legend_position: LegendPosition,
}

fn default_true() -> bool {
    true
}

/// Validate that there is a series and that none is drawn from the x axis dimension
fn validate_chart_config(config: &ChartConfig) -> Result<(), ValidationError> {
    if config.series.is_empty() {
        return Err(ValidationError::new("at least one series is required"));
    }
    if let Some(series) = config
        .series
        .iter()
        .find(|series| series.dimension == config.x_axis_dimension)
    {
        let mut error =
            ValidationError::new("Series dimension must differ from the x axis dimension");
        error.add_param("dimension".into(), &series.dimension);
        return Err(error);
    }
    Ok(())
}

/// Request data for extracting chart series
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct SeriesRequest {
    /// The dataset to chart
    pub dataset: DatasetPayload,
    /// Chart configuration
    #[validate]
    pub chart: ChartConfig,
}

/// Sort direction
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Sort order of a table
#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct Sort {
    /// Column identifier
    #[validate(length(min = 1, message = "sort column must not be empty"))]
    pub column: String,
    /// Sort direction
    #[serde(default)]
    pub direction: SortDirection,
}

/// Search, filter, sort and paging of a flattened table
#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct TableQuery {
    /// Case-insensitive text matched against every cell
    pub search: Option<String>,
    /// Case-insensitive text matched against a single column, by column identifier
    #[serde(default)]
    pub filters: HashMap<String, String>,
    /// Sort order
    #[validate]
    pub sort: Option<Sort>,
    /// Visible column identifiers. All columns are visible if unset.
    #[validate(length(min = 1, message = "columns must not be empty"))]
    pub columns: Option<Vec<String>>,
    /// Page number, starting at 1
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be greater than 0"))]
    pub page: usize,
    /// Rows per page
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 1000, message = "page size must be between 1 and 1000"))]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

impl Default for TableQuery {
    fn default() -> Self {
        TableQuery {
            search: None,
            filters: HashMap::new(),
            sort: None,
            columns: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

/// Request data for table views and CSV export
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct TableRequest {
    /// The dataset to tabulate
    pub dataset: DatasetPayload,
    /// Optional subset of categories
    pub selection: Option<Selection>,
    /// Table query
    #[serde(default)]
    #[validate]
    pub query: TableQuery,
}

/// Kinds of data API request
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, PartialEq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QueryKind {
    /// Selected categories of a dataset
    #[default]
    Dataset,
    /// Dataset metadata without values
    Metadata,
    /// Catalogue search
    Search,
    /// Catalogue themes
    Themes,
    /// Publishing organisations
    Organisations,
}

/// Request data for building a data API request
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_query_request"))]
pub struct QueryRequest {
    /// Kind of request
    #[serde(default)]
    pub kind: QueryKind,
    /// Dataset (matrix) code. Required for dataset and metadata requests.
    #[validate(length(min = 1, message = "matrix must not be empty"))]
    pub matrix: Option<String>,
    /// Categories to read. Required for dataset requests.
    pub selection: Option<Selection>,
    /// Search text. Required for search requests.
    pub search: Option<String>,
    /// Language code. Defaults to the configured language.
    #[validate(length(min = 1, message = "language must not be empty"))]
    pub language: Option<String>,
}

/// Validate that a query has what its kind needs
fn validate_query_request(request: &QueryRequest) -> Result<(), ValidationError> {
    let needs_matrix = matches!(request.kind, QueryKind::Dataset | QueryKind::Metadata);
    if needs_matrix && request.matrix.is_none() {
        let mut error = ValidationError::new("matrix is required");
        error.add_param("kind".into(), &request.kind.to_string());
        return Err(error);
    }
    if request.kind == QueryKind::Dataset {
        let selected = request
            .selection
            .as_ref()
            .map(|selection| selection.values().any(|codes| !codes.is_empty()))
            .unwrap_or(false);
        if !selected {
            return Err(ValidationError::new(
                "Selection must include at least one category",
            ));
        }
    }
    if request.kind == QueryKind::Search
        && request
            .search
            .as_deref()
            .map_or(true, |search| search.trim().is_empty())
    {
        return Err(ValidationError::new("search text is required"));
    }
    Ok(())
}

/// A data API request envelope
#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RpcRequest {
    Dataset(rpc::Request<rpc::ReadDatasetParams>),
    Metadata(rpc::Request<rpc::ReadMetadataParams>),
    Search(rpc::Request<rpc::SearchParams>),
    Themes(rpc::Request<rpc::ReadThemesParams>),
    Organisations(rpc::Request<rpc::ReadOrganisationsParams>),
}

/// Response to a query request
#[derive(Debug, PartialEq, Serialize)]
pub struct QueryResponse {
    /// Where to POST the request
    pub endpoint: Url,
    /// The JSON-RPC request
    pub request: RpcRequest,
}

/// Catalogue search results, either bare or inside a JSON-RPC response envelope.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SearchPayload {
    /// JSON-RPC response wrapping the results
    Envelope(rpc::Response<Vec<SearchResult>>),
    /// Bare results
    Bare(Vec<SearchResult>),
}

impl SearchPayload {
    /// Unwrap the payload into its results.
    pub fn into_results(self) -> Result<Vec<SearchResult>, StatCubeError> {
        match self {
            SearchPayload::Envelope(response) => response.into_result(),
            SearchPayload::Bare(results) => Ok(results),
        }
    }
}

/// Order of catalogue search results
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrder {
    /// As returned by the search
    #[default]
    Relevance,
    /// Most recently released first
    Newest,
}

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|text| Date::parse(&text, DATE_FORMAT).map_err(de::Error::custom))
        .transpose()
}

/// Facet selection and order of catalogue search results
///
/// An empty facet selection matches every result. The release date range only applies when both
/// of its ends are given.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_search_filter"))]
pub struct SearchFilter {
    /// Selected topics (themes)
    #[serde(default)]
    pub topics: Vec<String>,
    /// Selected subjects
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Selected publishing organisations
    #[serde(default)]
    pub organisations: Vec<String>,
    /// First release date, inclusive, as `YYYY-MM-DD`
    #[serde(default, deserialize_with = "deserialize_date")]
    pub released_from: Option<Date>,
    /// Last release date, inclusive, as `YYYY-MM-DD`
    #[serde(default, deserialize_with = "deserialize_date")]
    pub released_to: Option<Date>,
    /// Result order
    #[serde(default)]
    pub order: SearchOrder,
}

/// Validate that the release date range is not reversed
fn validate_search_filter(filter: &SearchFilter) -> Result<(), ValidationError> {
    match (filter.released_from, filter.released_to) {
        (Some(from), Some(to)) if from > to => Err(ValidationError::new(
            "released_from must not be after released_to",
        )),
        _ => Ok(()),
    }
}

/// Request data for faceting and filtering catalogue search results
#[derive(Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest {
    /// Results of a catalogue search
    pub results: SearchPayload,
    /// Facet selection and order
    #[serde(default)]
    #[validate]
    pub filter: SearchFilter,
}
