//! JSON-stat 2.0 wire format
//!
//! The statistical data API returns datasets in [JSON-stat](https://json-stat.org/format/)
//! format. These types mirror the parts of the format we consume, leaving every member optional so
//! that a structurally incomplete payload is reported as a
//! [MalformedCube](crate::error::StatCubeError::MalformedCube) error rather than as a
//! deserialisation failure.

use crate::cube::{Cube, Dimension};
use crate::error::StatCubeError;

use hashbrown::HashMap;
use serde::Deserialize;

/// A JSON-stat dataset response.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Dataset {
    /// JSON-stat version
    pub version: Option<String>,
    /// Response class. Only `dataset` is supported.
    pub class: Option<String>,
    /// Dataset title
    pub label: Option<String>,
    /// Publishing organisation
    pub source: Option<String>,
    /// Last update timestamp
    pub updated: Option<String>,
    /// Location of the dataset
    pub href: Option<String>,
    /// Dimension identifiers, slowest-varying first
    pub id: Option<Vec<String>>,
    /// Number of categories in each dimension
    pub size: Option<Vec<usize>>,
    /// Dimension descriptors
    pub dimension: Option<HashMap<String, DimensionDescriptor>>,
    /// Cell values
    pub value: Option<Values>,
    /// Free-text annotations
    pub note: Option<Vec<String>>,
    /// Provider-specific metadata
    pub extension: Option<serde_json::Value>,
}

/// A JSON-stat dimension object.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DimensionDescriptor {
    /// Dimension label
    pub label: Option<String>,
    /// Categories of the dimension
    pub category: Option<Category>,
}

/// A JSON-stat category object.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Category {
    /// Category order
    pub index: Option<CategoryIndex>,
    /// Category labels by code
    pub label: Option<HashMap<String, String>>,
    /// Units of measure by code
    pub unit: Option<serde_json::Value>,
}

/// Category order, either as an array of codes or as an object mapping codes to positions.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CategoryIndex {
    Codes(Vec<String>),
    Positions(HashMap<String, usize>),
}

/// Cell values, either dense or sparse (keyed by flat offset).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Values {
    Dense(Vec<Option<f64>>),
    Sparse(HashMap<String, Option<f64>>),
}

fn missing(member: &str) -> StatCubeError {
    StatCubeError::malformed(format!("dataset is missing `{}`", member))
}

impl CategoryIndex {
    /// Returns the category codes by position.
    fn into_codes(self, dimension: &str) -> Result<Vec<String>, StatCubeError> {
        match self {
            CategoryIndex::Codes(codes) => Ok(codes),
            CategoryIndex::Positions(positions) => {
                let mut codes: Vec<Option<String>> = vec![None; positions.len()];
                for (code, position) in positions {
                    match codes.get_mut(position) {
                        Some(slot) if slot.is_none() => *slot = Some(code),
                        _ => {
                            return Err(StatCubeError::malformed(format!(
                                "dimension {} has an invalid category position {} for {}",
                                dimension, position, code
                            )))
                        }
                    }
                }
                // Every slot is filled: positions are in range and distinct.
                Ok(codes.into_iter().flatten().collect())
            }
        }
    }
}

impl DimensionDescriptor {
    /// Convert into a [Dimension] with identifier `id`.
    fn into_dimension(self, id: &str) -> Result<Dimension, StatCubeError> {
        let category = self
            .category
            .ok_or_else(|| missing(&format!("dimension.{}.category", id)))?;
        let category_label = category.label.unwrap_or_default();
        let category_index = match category.index {
            Some(index) => index.into_codes(id)?,
            // Without an index, the order is only known when there is a single category.
            None if category_label.len() <= 1 => category_label.keys().cloned().collect(),
            None => return Err(missing(&format!("dimension.{}.category.index", id))),
        };
        let dimension = Dimension::new(id, category_index, category_label);
        Ok(match self.label {
            Some(label) => dimension.with_label(label),
            None => dimension,
        })
    }
}

impl Values {
    /// Returns dense values for a cube with `count` cells.
    fn into_dense(self, count: usize) -> Result<Vec<Option<f64>>, StatCubeError> {
        match self {
            Values::Dense(values) => Ok(values),
            Values::Sparse(values) => {
                let mut dense = vec![None; count];
                for (offset, value) in values {
                    let slot = offset
                        .parse::<usize>()
                        .ok()
                        .and_then(|offset| dense.get_mut(offset))
                        .ok_or_else(|| {
                            StatCubeError::malformed(format!("invalid value offset {}", offset))
                        })?;
                    *slot = value;
                }
                Ok(dense)
            }
        }
    }
}

impl Dataset {
    /// Convert into a validated [Cube].
    ///
    /// The structure of the dataset is checked first, and `check_cells` is then given the number
    /// of cells implied by the sizes. Storage for sparse values is only allocated if it accepts
    /// that number.
    pub fn into_cube<F>(self, check_cells: F) -> Result<Cube, StatCubeError>
    where
        F: FnOnce(usize) -> Result<(), StatCubeError>,
    {
        if let Some(class) = &self.class {
            if class != "dataset" {
                return Err(StatCubeError::malformed(format!(
                    "unsupported JSON-stat class {}",
                    class
                )));
            }
        }
        let dimension_order = self.id.ok_or_else(|| missing("id"))?;
        let sizes = self.size.ok_or_else(|| missing("size"))?;
        let mut descriptors = self.dimension.ok_or_else(|| missing("dimension"))?;
        let values = self.value.ok_or_else(|| missing("value"))?;

        let mut dimensions = HashMap::with_capacity(dimension_order.len());
        for id in &dimension_order {
            let descriptor = descriptors.remove(id).ok_or_else(|| {
                StatCubeError::malformed(format!("dimension {} has no descriptor", id))
            })?;
            dimensions.insert(id.clone(), descriptor.into_dimension(id)?);
        }

        let mut cube = Cube {
            dimension_order,
            sizes,
            dimensions,
            values: vec![],
        };
        cube.ordered_dimensions()?;
        let count = cube.cell_count()?;
        check_cells(count)?;
        cube.values = values.into_dense(count)?;
        cube.validate()?;
        Ok(cube)
    }
}

impl TryFrom<Dataset> for Cube {
    type Error = StatCubeError;

    /// Convert a JSON-stat dataset into a validated [Cube], without a limit on its size.
    fn try_from(dataset: Dataset) -> Result<Self, Self::Error> {
        dataset.into_cube(|_| Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_manager::ResourceManager;
    use crate::test_utils;

    use serde_test::{assert_de_tokens, Token};

    fn parse(json: &str) -> Result<Cube, StatCubeError> {
        Cube::try_from(serde_json::from_str::<Dataset>(json).unwrap())
    }

    fn assert_malformed(result: Result<Cube, StatCubeError>, expected: &str) {
        match result.unwrap_err() {
            StatCubeError::MalformedCube { reason } => assert_eq!(expected, reason),
            err => panic!("expected malformed cube error, got {:?}", err),
        }
    }

    #[test]
    fn test_category_index_tokens() {
        assert_de_tokens(
            &CategoryIndex::Codes(vec!["N".to_string(), "S".to_string()]),
            &[
                Token::Seq { len: Some(2) },
                Token::Str("N"),
                Token::Str("S"),
                Token::SeqEnd,
            ],
        );
        assert_de_tokens(
            &CategoryIndex::Positions([("N".to_string(), 0)].into_iter().collect()),
            &[
                Token::Map { len: Some(1) },
                Token::Str("N"),
                Token::U64(0),
                Token::MapEnd,
            ],
        );
    }

    #[test]
    fn test_values_tokens() {
        assert_de_tokens(
            &Values::Dense(vec![Some(1.5), None]),
            &[
                Token::Seq { len: Some(2) },
                Token::F64(1.5),
                Token::Unit,
                Token::SeqEnd,
            ],
        );
    }

    #[test]
    fn test_dataset() {
        let cube = parse(test_utils::TEST_DATASET_JSON).unwrap();
        assert_eq!(test_utils::get_test_cube(), cube);
    }

    #[test]
    fn test_dataset_metadata() {
        let dataset = serde_json::from_str::<Dataset>(test_utils::TEST_DATASET_JSON).unwrap();
        assert_eq!(Some("2.0"), dataset.version.as_deref());
        assert_eq!(
            Some("Population by year and region"),
            dataset.label.as_deref()
        );
        assert_eq!(Some("Test Office"), dataset.source.as_deref());
    }

    #[test]
    fn test_category_positions() {
        let json = r#"{"id": ["r"], "size": [3], "value": [1, 2, 3],
            "dimension": {"r": {"category": {"index": {"c": 2, "a": 0, "b": 1}}}}}"#;
        let cube = parse(json).unwrap();
        assert_eq!(
            vec!["a", "b", "c"],
            cube.dimension("r").unwrap().category_index
        );
    }

    #[test]
    fn test_category_positions_out_of_range() {
        let json = r#"{"id": ["r"], "size": [2], "value": [1, 2],
            "dimension": {"r": {"category": {"index": {"a": 0, "b": 2}}}}}"#;
        assert_malformed(
            parse(json),
            "dimension r has an invalid category position 2 for b",
        );
    }

    #[test]
    fn test_single_category_without_index() {
        let json = r#"{"id": ["unit"], "size": [1], "value": [5],
            "dimension": {"unit": {"category": {"label": {"EUR": "Euro"}}}}}"#;
        let cube = parse(json).unwrap();
        let unit = cube.dimension("unit").unwrap();
        assert_eq!(vec!["EUR"], unit.category_index);
        assert_eq!("Euro", unit.category_label(0));
    }

    #[test]
    fn test_multiple_categories_without_index() {
        let json = r#"{"id": ["r"], "size": [2], "value": [1, 2],
            "dimension": {"r": {"category": {"label": {"a": "A", "b": "B"}}}}}"#;
        assert_malformed(parse(json), "dataset is missing `dimension.r.category.index`");
    }

    #[test]
    fn test_sparse_values() {
        let json = r#"{"id": ["r"], "size": [3], "value": {"0": 1, "2": null},
            "dimension": {"r": {"category": {"index": ["a", "b", "c"]}}}}"#;
        let cube = parse(json).unwrap();
        assert_eq!(vec![Some(1.0), None, None], cube.values);
    }

    #[test]
    fn test_sparse_values_invalid_offset() {
        let json = r#"{"id": ["r"], "size": [1], "value": {"3": 1},
            "dimension": {"r": {"category": {"index": ["a"]}}}}"#;
        assert_malformed(parse(json), "invalid value offset 3");
    }

    #[test]
    fn test_short_dense_values() {
        let json = r#"{"id": ["r"], "size": [3], "value": [1],
            "dimension": {"r": {"category": {"index": ["a", "b", "c"]}}}}"#;
        let cube = parse(json).unwrap();
        assert_eq!(3, cube.flatten().unwrap().len());
    }

    #[test]
    fn test_missing_members() {
        assert_malformed(parse("{}"), "dataset is missing `id`");
        assert_malformed(parse(r#"{"id": []}"#), "dataset is missing `size`");
        assert_malformed(
            parse(r#"{"id": [], "size": []}"#),
            "dataset is missing `dimension`",
        );
        assert_malformed(
            parse(r#"{"id": [], "size": [], "dimension": {}}"#),
            "dataset is missing `value`",
        );
    }

    #[test]
    fn test_missing_dimension_descriptor() {
        let json = r#"{"id": ["r"], "size": [1], "value": [1], "dimension": {}}"#;
        assert_malformed(parse(json), "dimension r has no descriptor");
    }

    #[test]
    fn test_missing_category() {
        let json = r#"{"id": ["r"], "size": [1], "value": [1], "dimension": {"r": {}}}"#;
        assert_malformed(parse(json), "dataset is missing `dimension.r.category`");
    }

    #[test]
    fn test_size_mismatch() {
        let json = r#"{"id": ["r"], "size": [2], "value": [1],
            "dimension": {"r": {"category": {"index": ["a"]}}}}"#;
        assert_malformed(parse(json), "dimension r has 1 categories but size 2");
    }

    #[test]
    fn test_size_beyond_categories() {
        let json = r#"{"id": ["r"], "size": [1152921504606846976], "value": {},
            "dimension": {"r": {"category": {"index": ["a"]}}}}"#;
        assert_malformed(
            parse(json),
            "dimension r has 1 categories but size 1152921504606846976",
        );
    }

    #[test]
    fn test_cell_limit_before_sparse_values() {
        // Two dimensions of 100k categories, about 160 GB once densified.
        let codes: Vec<String> = (0..100_000).map(|i| i.to_string()).collect();
        let descriptor = DimensionDescriptor {
            label: None,
            category: Some(Category {
                index: Some(CategoryIndex::Codes(codes)),
                label: None,
                unit: None,
            }),
        };
        let dataset = Dataset {
            id: Some(vec!["a".to_string(), "b".to_string()]),
            size: Some(vec![100_000, 100_000]),
            dimension: Some(
                [
                    ("a".to_string(), descriptor.clone()),
                    ("b".to_string(), descriptor),
                ]
                .into_iter()
                .collect(),
            ),
            value: Some(Values::Sparse(HashMap::new())),
            ..Default::default()
        };
        let rm = ResourceManager::new(None, Some(1_000_000));
        match dataset.into_cube(|count| rm.cells(count)).unwrap_err() {
            StatCubeError::TooManyCells { requested, limit } => {
                assert_eq!(10_000_000_000, requested);
                assert_eq!(1_000_000, limit);
            }
            err => panic!("expected too many cells error, got {:?}", err),
        }
    }

    #[test]
    fn test_cell_limit_not_reached() {
        let dataset = serde_json::from_str::<Dataset>(test_utils::TEST_DATASET_JSON).unwrap();
        let mut checked = None;
        let cube = dataset
            .into_cube(|count| {
                checked = Some(count);
                Ok(())
            })
            .unwrap();
        assert_eq!(Some(4), checked);
        assert_eq!(test_utils::get_test_cube(), cube);
    }

    #[test]
    fn test_unsupported_class() {
        let json = r#"{"class": "collection"}"#;
        assert_malformed(parse(json), "unsupported JSON-stat class collection");
    }
}
