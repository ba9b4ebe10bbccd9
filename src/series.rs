//! Chart series extraction
//!
//! Reads one data series per configured series out of a cube, along a chosen x axis dimension.
//! Dimensions that are neither plotted nor a series are pinned to a single category.

use crate::cube::Cube;
use crate::error::StatCubeError;
use crate::models::{ChartConfig, ChartType, LegendPosition};

use hashbrown::HashMap;
use serde::Serialize;

/// Title used when the chart configuration has none
const DEFAULT_TITLE: &str = "Chart Title";

/// Label used for a series whose dimension has no categories
const DEFAULT_SERIES_LABEL: &str = "New Series";

/// Y axis used by series without one when the chart has two y axes
const DEFAULT_Y_AXIS: &str = "y-axis-0";

/// One series of chart data
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartDataset {
    pub label: String,
    /// One value per x axis label
    pub data: Vec<Option<f64>>,
    pub background_color: String,
    pub border_color: String,
    pub border_width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis_id: Option<String>,
}

/// Data and options for rendering a chart
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartData {
    pub chart_type: ChartType,
    pub title: String,
    /// Category labels along the x axis
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
    pub x_axis_label: Option<String>,
    pub y_axis_label: Option<String>,
    pub stacked: bool,
    pub dual_axis: bool,
    pub begin_at_zero: bool,
    pub legend_position: LegendPosition,
}

/// Returns the colour of the series at `index`.
fn colour(index: usize) -> String {
    format!("hsl({}, 70%, 50%)", index * 60)
}

/// Extract chart data from a cube.
///
/// # Errors
///
/// * [StatCubeError::UnknownDimension] if the x axis, a series or a fixed dimension is not part
///   of the cube
/// * [StatCubeError::UnknownCategory] if an x axis label is not a category of the x axis
///   dimension
pub fn extract(cube: &Cube, config: &ChartConfig) -> Result<ChartData, StatCubeError> {
    cube.validate()?;
    let x_axis = cube.dimension(&config.x_axis_dimension)?;
    if let Some(unknown) = config
        .fixed
        .keys()
        .find(|id| !cube.dimensions.contains_key(*id))
    {
        return Err(StatCubeError::UnknownDimension {
            dimension: unknown.clone(),
        });
    }

    let x_positions = if config.labels.is_empty() {
        (0..x_axis.len()).collect()
    } else {
        let mut positions = Vec::with_capacity(config.labels.len());
        for code in &config.labels {
            let position = x_axis.resolve_position(code)?;
            if !positions.contains(&position) {
                positions.push(position);
            }
        }
        positions
    };
    let labels = x_positions
        .iter()
        .map(|position| x_axis.category_label(*position).to_string())
        .collect();

    let mut datasets = Vec::with_capacity(config.series.len());
    for (index, series) in config.series.iter().enumerate() {
        let series_dimension = cube.dimension(&series.dimension)?;
        let series_position = series_dimension.resolve_or_default(series.code.as_deref());

        let mut coordinates: HashMap<String, usize> = HashMap::with_capacity(cube.sizes.len());
        for id in &cube.dimension_order {
            if *id == x_axis.id {
                continue;
            }
            let position = if *id == series_dimension.id {
                series_position
            } else {
                cube.dimension(id)?
                    .resolve_or_default(config.fixed.get(id).map(String::as_str))
            };
            coordinates.insert(id.clone(), position);
        }

        let mut data = Vec::with_capacity(x_positions.len());
        for position in &x_positions {
            coordinates.insert(x_axis.id.clone(), *position);
            data.push(cube.value_at(cube.flat_offset(&coordinates)?));
        }

        let label = match &series.label {
            Some(label) => label.clone(),
            None if series_dimension.is_empty() => DEFAULT_SERIES_LABEL.to_string(),
            None => series_dimension.category_label(series_position).to_string(),
        };
        let y_axis_id = config.dual_axis.then(|| {
            series
                .y_axis
                .clone()
                .unwrap_or_else(|| DEFAULT_Y_AXIS.to_string())
        });
        datasets.push(ChartDataset {
            label,
            data,
            background_color: colour(index),
            border_color: colour(index),
            border_width: 1,
            y_axis_id,
        });
    }

    Ok(ChartData {
        chart_type: config.chart_type,
        title: config
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        labels,
        datasets,
        x_axis_label: config.x_axis_label.clone(),
        y_axis_label: config.y_axis_label.clone(),
        stacked: config.stacked,
        dual_axis: config.dual_axis,
        begin_at_zero: !config.auto_scale,
        legend_position: config.legend_position,
    })
}
