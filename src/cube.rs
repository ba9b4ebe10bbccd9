//! JSON-stat data cubes and their transformation into row-oriented tables.
//!
//! A [Cube] holds per-dimension category metadata and a flat array of values laid out in
//! row-major order over the dimension order, with the **last** dimension varying fastest. This is
//! the JSON-stat convention, and every offset computed here follows it.

use crate::error::StatCubeError;

use hashbrown::HashMap;
use ndarray::{ArrayD, Axis, Dimension as _, IxDyn};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{event, Level};

/// Name of the column holding the cell value in flattened rows.
pub const VALUE_COLUMN: &str = "Value";

/// Selected category codes, keyed by dimension identifier.
///
/// Dimensions that are absent, or that map to an empty list, are not restricted.
pub type Selection = HashMap<String, Vec<String>>;

/// One axis of a cube.
#[derive(Clone, Debug, PartialEq)]
pub struct Dimension {
    /// Dimension identifier
    pub id: String,
    /// Human-readable dimension label
    pub label: Option<String>,
    /// Category codes, by position
    pub category_index: Vec<String>,
    /// Category labels, by code
    pub category_label: HashMap<String, String>,
}

impl Dimension {
    /// Return a new Dimension without a dimension label.
    pub fn new(
        id: impl Into<String>,
        category_index: Vec<String>,
        category_label: HashMap<String, String>,
    ) -> Self {
        Dimension {
            id: id.into(),
            label: None,
            category_index,
            category_label,
        }
    }

    /// Set the human-readable label of the dimension.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.category_index.len()
    }

    /// Whether the dimension has no categories.
    pub fn is_empty(&self) -> bool {
        self.category_index.is_empty()
    }

    /// Header text for the dimension: its label if present, otherwise its identifier.
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Returns the label of the category at `position`.
    ///
    /// Falls back to the category code when the dimension carries no label for it.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of range.
    pub fn category_label(&self, position: usize) -> &str {
        let code = &self.category_index[position];
        self.category_label
            .get(code)
            .map(String::as_str)
            .unwrap_or(code)
    }

    /// Returns the zero-based position of `code` within the category index.
    ///
    /// # Errors
    ///
    /// Returns [StatCubeError::UnknownCategory] when the code is not part of the index.
    pub fn resolve_position(&self, code: &str) -> Result<usize, StatCubeError> {
        self.category_index
            .iter()
            .position(|candidate| candidate == code)
            .ok_or_else(|| StatCubeError::UnknownCategory {
                dimension: self.id.clone(),
                code: code.to_string(),
            })
    }

    /// Returns the position of `code`, or position 0 when no code is given or it does not
    /// resolve.
    ///
    /// Only chart series extraction uses this: a series pins the dimensions it does not plot to
    /// their first category unless told otherwise. Everything else uses
    /// [resolve_position](Dimension::resolve_position).
    pub fn resolve_or_default(&self, code: Option<&str>) -> usize {
        match code {
            Some(code) => self.resolve_position(code).unwrap_or_else(|err| {
                event!(Level::DEBUG, "{}, defaulting to first category", err);
                0
            }),
            None => {
                event!(
                    Level::DEBUG,
                    "no category given for dimension {}, defaulting to first category",
                    self.id
                );
                0
            }
        }
    }

    /// Returns a copy of the dimension restricted to the categories at `positions`, in that
    /// order.
    fn restrict(&self, positions: &[usize]) -> Dimension {
        let category_index: Vec<String> = positions
            .iter()
            .map(|position| self.category_index[*position].clone())
            .collect();
        let category_label = category_index
            .iter()
            .filter_map(|code| {
                self.category_label
                    .get(code)
                    .map(|label| (code.clone(), label.clone()))
            })
            .collect();
        Dimension {
            id: self.id.clone(),
            label: self.label.clone(),
            category_index,
            category_label,
        }
    }
}

/// A multi-dimensional statistical dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct Cube {
    /// Dimension identifiers, slowest-varying first
    pub dimension_order: Vec<String>,
    /// Number of categories of each dimension, in dimension order
    pub sizes: Vec<usize>,
    /// Dimension descriptors, by identifier
    pub dimensions: HashMap<String, Dimension>,
    /// Flat cell values. `None` means no data.
    pub values: Vec<Option<f64>>,
}

/// A single flattened record: one category label per dimension plus the cell value.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// (dimension identifier, category label) pairs in dimension order
    pub labels: Vec<(String, String)>,
    /// Cell value
    pub value: Option<f64>,
}

impl Row {
    /// Returns the label for a dimension column, if the row has one.
    pub fn label(&self, dimension: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(id, _)| id == dimension)
            .map(|(_, label)| label.as_str())
    }
}

impl Serialize for Row {
    /// Rows serialise as a map of dimension to label, in dimension order, followed by `Value`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.labels.len() + 1))?;
        for (dimension, label) in &self.labels {
            map.serialize_entry(dimension, label)?;
        }
        map.serialize_entry(VALUE_COLUMN, &self.value)?;
        map.end()
    }
}

/// A single cell read by category codes.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Cell {
    /// Offset of the cell in the flat value array
    pub offset: usize,
    /// Cell value, or `None` if missing or beyond the end of the value array
    pub value: Option<f64>,
}

/// Returns the flat offset for per-dimension `positions`.
///
/// Accumulates from the last dimension to the first, so the last dimension varies fastest. The
/// multiplier of a dimension may overflow without error as long as its position is zero.
fn offset_of(sizes: &[usize], positions: &[usize]) -> Result<usize, StatCubeError> {
    let mut offset = Some(0_usize);
    let mut multiplier = Some(1_usize);
    for (position, size) in positions.iter().zip(sizes).rev() {
        if *position != 0 {
            let term = multiplier.and_then(|multiplier| position.checked_mul(multiplier));
            offset = offset
                .zip(term)
                .and_then(|(offset, term)| offset.checked_add(term));
        }
        multiplier = multiplier.and_then(|multiplier| multiplier.checked_mul(*size));
    }
    offset.ok_or_else(|| StatCubeError::malformed("flat offset overflows"))
}

impl Cube {
    /// Return a new Cube from dimensions in order and their values.
    ///
    /// Sizes are taken from the number of categories of each dimension.
    pub fn new(dimensions: Vec<Dimension>, values: Vec<Option<f64>>) -> Self {
        Cube {
            dimension_order: dimensions.iter().map(|d| d.id.clone()).collect(),
            sizes: dimensions.iter().map(Dimension::len).collect(),
            dimensions: dimensions.into_iter().map(|d| (d.id.clone(), d)).collect(),
            values,
        }
    }

    /// Returns the dimension descriptor for `id`.
    pub fn dimension(&self, id: &str) -> Result<&Dimension, StatCubeError> {
        self.dimensions
            .get(id)
            .ok_or_else(|| StatCubeError::UnknownDimension {
                dimension: id.to_string(),
            })
    }

    /// Returns the number of cells implied by the sizes.
    pub fn cell_count(&self) -> Result<usize, StatCubeError> {
        self.sizes
            .iter()
            .try_fold(1_usize, |count, size| count.checked_mul(*size))
            .ok_or_else(|| StatCubeError::malformed("number of cells overflows"))
    }

    /// Returns the dimension descriptors in dimension order, checking that they are consistent
    /// with the sizes.
    pub fn ordered_dimensions(&self) -> Result<Vec<&Dimension>, StatCubeError> {
        if self.dimension_order.len() != self.sizes.len() {
            return Err(StatCubeError::malformed(format!(
                "{} dimensions but {} sizes",
                self.dimension_order.len(),
                self.sizes.len()
            )));
        }
        self.dimension_order
            .iter()
            .zip(&self.sizes)
            .map(|(id, size)| {
                let dimension = self.dimensions.get(id).ok_or_else(|| {
                    StatCubeError::malformed(format!("dimension {} has no descriptor", id))
                })?;
                if dimension.len() != *size {
                    return Err(StatCubeError::malformed(format!(
                        "dimension {} has {} categories but size {}",
                        id,
                        dimension.len(),
                        size
                    )));
                }
                Ok(dimension)
            })
            .collect()
    }

    /// Check the structural invariants of the cube.
    ///
    /// A value array shorter than the number of cells is accepted: the trailing cells read as
    /// missing. A longer one is rejected.
    pub fn validate(&self) -> Result<(), StatCubeError> {
        self.ordered_dimensions()?;
        let count = self.cell_count()?;
        if self.values.len() > count {
            return Err(StatCubeError::malformed(format!(
                "{} values but only {} cells",
                self.values.len(),
                count
            )));
        }
        Ok(())
    }

    /// Returns the value at `offset`, or `None` if it is missing or beyond the end.
    pub fn value_at(&self, offset: usize) -> Option<f64> {
        self.values.get(offset).copied().flatten()
    }

    /// Flatten the cube into one row per coordinate combination.
    ///
    /// Rows are ordered lexicographically by category position, with the first dimension
    /// varying slowest. Exactly `product(sizes)` rows are returned; cells beyond the end of the
    /// value array have no value.
    pub fn flatten(&self) -> Result<Vec<Row>, StatCubeError> {
        self.validate()?;
        let dimensions = self.ordered_dimensions()?;
        let mut rows = Vec::with_capacity(self.cell_count()?);
        for index in ndarray::indices(IxDyn(&self.sizes)) {
            let positions = index.slice();
            let labels = dimensions
                .iter()
                .zip(positions)
                .map(|(dimension, position)| {
                    (
                        dimension.id.clone(),
                        dimension.category_label(*position).to_string(),
                    )
                })
                .collect();
            let value = self.value_at(offset_of(&self.sizes, positions)?);
            rows.push(Row { labels, value });
        }
        Ok(rows)
    }

    /// Returns the flat offset of a cell given its category position in every dimension.
    ///
    /// The offset is not checked against the length of the value array.
    pub fn flat_offset(&self, coordinates: &HashMap<String, usize>) -> Result<usize, StatCubeError> {
        if self.dimension_order.len() != self.sizes.len() {
            return Err(StatCubeError::malformed(format!(
                "{} dimensions but {} sizes",
                self.dimension_order.len(),
                self.sizes.len()
            )));
        }
        let positions = self
            .dimension_order
            .iter()
            .map(|id| {
                coordinates
                    .get(id)
                    .copied()
                    .ok_or_else(|| StatCubeError::MissingCoordinate {
                        dimension: id.clone(),
                    })
            })
            .collect::<Result<Vec<usize>, StatCubeError>>()?;
        offset_of(&self.sizes, &positions)
    }

    /// Read a single cell given a category code for every dimension.
    pub fn cell(&self, codes: &HashMap<String, String>) -> Result<Cell, StatCubeError> {
        let dimensions = self.ordered_dimensions()?;
        if let Some(unknown) = codes.keys().find(|id| !self.dimensions.contains_key(*id)) {
            return Err(StatCubeError::UnknownDimension {
                dimension: unknown.clone(),
            });
        }
        let mut coordinates = HashMap::with_capacity(dimensions.len());
        for dimension in dimensions {
            let code = codes
                .get(&dimension.id)
                .ok_or_else(|| StatCubeError::MissingCoordinate {
                    dimension: dimension.id.clone(),
                })?;
            coordinates.insert(dimension.id.clone(), dimension.resolve_position(code)?);
        }
        let offset = self.flat_offset(&coordinates)?;
        Ok(Cell {
            offset,
            value: self.value_at(offset),
        })
    }

    /// Returns the sub-cube containing only the selected categories.
    ///
    /// Selected codes keep the order in which they are given; repeated codes are ignored.
    pub fn select(&self, selection: &Selection) -> Result<Cube, StatCubeError> {
        self.validate()?;
        if let Some(unknown) = selection
            .keys()
            .find(|id| !self.dimensions.contains_key(*id))
        {
            return Err(StatCubeError::UnknownDimension {
                dimension: unknown.clone(),
            });
        }
        let dimensions = self.ordered_dimensions()?;

        let mut values = self.values.clone();
        values.resize(self.cell_count()?, None);
        let mut array = ArrayD::from_shape_vec(IxDyn(&self.sizes), values)
            .map_err(|err| StatCubeError::malformed(err.to_string()))?;

        let mut selected = Vec::with_capacity(dimensions.len());
        for (axis, dimension) in dimensions.into_iter().enumerate() {
            match selection.get(&dimension.id).filter(|codes| !codes.is_empty()) {
                Some(codes) => {
                    let mut positions = Vec::with_capacity(codes.len());
                    for code in codes {
                        let position = dimension.resolve_position(code)?;
                        if !positions.contains(&position) {
                            positions.push(position);
                        }
                    }
                    array = array.select(Axis(axis), &positions);
                    selected.push(dimension.restrict(&positions));
                }
                None => selected.push(dimension.clone()),
            }
        }

        Ok(Cube {
            dimension_order: self.dimension_order.clone(),
            sizes: array.shape().to_vec(),
            dimensions: selected.into_iter().map(|d| (d.id.clone(), d)).collect(),
            values: array.iter().copied().collect(),
        })
    }
}
