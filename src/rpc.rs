//! PxStat JSON-RPC envelopes
//!
//! The statistical data API is a JSON-RPC 2.0 service. We build request envelopes for the
//! dataset and metadata read methods and for the catalogue (search, themes and organisations),
//! and unwrap response envelopes, turning API errors into [StatCubeError::Rpc] rather than empty
//! results.

use crate::cube::Selection;
use crate::error::StatCubeError;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// JSON-RPC protocol version
pub const JSONRPC_VERSION: &str = "2.0";

/// Method reading a (filtered) dataset
pub const READ_DATASET: &str = "PxStat.Data.Cube_API.ReadDataset";

/// Method reading dataset metadata without values
pub const READ_METADATA: &str = "PxStat.Data.Cube_API.ReadMetadata";

/// Method searching the dataset catalogue
pub const SEARCH: &str = "PxStat.System.Navigation.Navigation_API.Search";

/// Method reading the navigation themes of the catalogue
pub const READ_THEMES: &str = "PxStat.System.Navigation.Navigation_API.Read";

/// Method reading the publishing organisations (copyright holders)
pub const READ_ORGANISATIONS: &str = "PxStat.System.Settings.Copyright_API.Read";

/// Path of the JSON-RPC endpoint below the API base URL
const RPC_PATH: &str = "api.jsonrpc";

const READ_DATASET_ID: u64 = 677981009;
const READ_METADATA_ID: u64 = 193280692;
const SEARCH_ID: u64 = 572340184;
const READ_THEMES_ID: u64 = 933080121;
const READ_ORGANISATIONS_ID: u64 = 193280692;

/// Returns the JSON-RPC endpoint for an API base URL.
pub fn endpoint(api_base_url: &Url) -> Url {
    let mut endpoint = api_base_url.clone();
    if let Ok(mut segments) = endpoint.path_segments_mut() {
        segments.pop_if_empty().push(RPC_PATH);
    }
    endpoint
}

/// A JSON-RPC request envelope.
#[derive(Debug, PartialEq, Serialize)]
pub struct Request<P> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: P,
    pub id: u64,
}

/// Requested response format
#[derive(Debug, PartialEq, Serialize)]
pub struct Format {
    #[serde(rename = "type")]
    pub format_type: &'static str,
    pub version: &'static str,
}

impl Default for Format {
    fn default() -> Self {
        Format {
            format_type: "JSON-stat",
            version: "2.0",
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Language {
    pub code: String,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct CategoryQuery {
    pub index: Vec<String>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct DimensionQuery {
    pub category: CategoryQuery,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ReadDatasetExtension {
    pub pivot: Option<String>,
    pub codes: bool,
    pub language: Language,
    pub format: Format,
    pub matrix: String,
}

/// Parameters of a [READ_DATASET] request
#[derive(Debug, PartialEq, Serialize)]
pub struct ReadDatasetParams {
    pub class: &'static str,
    pub id: Vec<String>,
    pub dimension: BTreeMap<String, DimensionQuery>,
    pub extension: ReadDatasetExtension,
    pub version: &'static str,
    pub m2m: bool,
}

/// Parameters of a [READ_METADATA] request
#[derive(Debug, PartialEq, Serialize)]
pub struct ReadMetadataParams {
    pub matrix: String,
    pub format: Format,
    pub language: String,
    pub m2m: bool,
}

/// Parameters of a [SEARCH] request
#[derive(Debug, PartialEq, Serialize)]
pub struct SearchParams {
    #[serde(rename = "Search")]
    pub search: String,
    #[serde(rename = "LngIsoCode")]
    pub language: String,
}

/// Parameters of a [READ_THEMES] request
#[derive(Debug, PartialEq, Serialize)]
pub struct ReadThemesParams {
    #[serde(rename = "LngIsoCode")]
    pub language: String,
}

/// Parameters of a [READ_ORGANISATIONS] request: there are none.
#[derive(Debug, PartialEq, Serialize)]
pub struct ReadOrganisationsParams {}

/// Build a request reading the selected categories of a dataset.
///
/// Only dimensions with at least one selected code are queried; the API returns every category
/// of the others.
pub fn read_dataset(
    matrix: &str,
    selection: &Selection,
    language: &str,
) -> Request<ReadDatasetParams> {
    let dimension: BTreeMap<String, DimensionQuery> = selection
        .iter()
        .filter(|(_, codes)| !codes.is_empty())
        .map(|(id, codes)| {
            (
                id.clone(),
                DimensionQuery {
                    category: CategoryQuery {
                        index: codes.clone(),
                    },
                },
            )
        })
        .collect();
    Request {
        jsonrpc: JSONRPC_VERSION,
        method: READ_DATASET,
        params: ReadDatasetParams {
            class: "query",
            id: dimension.keys().cloned().collect(),
            dimension,
            extension: ReadDatasetExtension {
                pivot: None,
                codes: false,
                language: Language {
                    code: language.to_string(),
                },
                format: Format::default(),
                matrix: matrix.to_string(),
            },
            version: "2.0",
            m2m: false,
        },
        id: READ_DATASET_ID,
    }
}

/// Build a request reading the metadata of a dataset.
pub fn read_metadata(matrix: &str, language: &str) -> Request<ReadMetadataParams> {
    Request {
        jsonrpc: JSONRPC_VERSION,
        method: READ_METADATA,
        params: ReadMetadataParams {
            matrix: matrix.to_string(),
            format: Format::default(),
            language: language.to_string(),
            m2m: false,
        },
        id: READ_METADATA_ID,
    }
}

/// Build a request searching the catalogue for `search`.
pub fn search(search: &str, language: &str) -> Request<SearchParams> {
    Request {
        jsonrpc: JSONRPC_VERSION,
        method: SEARCH,
        params: SearchParams {
            search: search.trim().to_string(),
            language: language.to_string(),
        },
        id: SEARCH_ID,
    }
}

/// Build a request reading the catalogue themes.
pub fn read_themes(language: &str) -> Request<ReadThemesParams> {
    Request {
        jsonrpc: JSONRPC_VERSION,
        method: READ_THEMES,
        params: ReadThemesParams {
            language: language.to_string(),
        },
        id: READ_THEMES_ID,
    }
}

/// Build a request reading the publishing organisations.
pub fn read_organisations() -> Request<ReadOrganisationsParams> {
    Request {
        jsonrpc: JSONRPC_VERSION,
        method: READ_ORGANISATIONS,
        params: ReadOrganisationsParams {},
        id: READ_ORGANISATIONS_ID,
    }
}

/// A JSON-RPC error object.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ErrorObject {
    #[serde(default)]
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// A JSON-RPC response envelope.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Response<T> {
    pub jsonrpc: String,
    pub result: Option<T>,
    pub error: Option<ErrorObject>,
    pub id: Option<serde_json::Value>,
}

impl<T> Response<T> {
    /// Unwrap the result of the response.
    ///
    /// # Errors
    ///
    /// * [StatCubeError::Rpc] if the response carries an error object
    /// * [StatCubeError::MalformedCube] if it carries neither a result nor an error
    pub fn into_result(self) -> Result<T, StatCubeError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(StatCubeError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(StatCubeError::malformed(
                "response has neither a result nor an error",
            )),
        }
    }
}
