use crate::cube::{Cube, Dimension};

use hashbrown::HashMap;

/// Create a Dimension from (code, label) pairs.
pub(crate) fn dimension(id: &str, categories: &[(&str, &str)]) -> Dimension {
    Dimension::new(
        id,
        categories.iter().map(|(code, _)| code.to_string()).collect(),
        categories
            .iter()
            .map(|(code, label)| (code.to_string(), label.to_string()))
            .collect(),
    )
}

/// Create an unlabelled Dimension with `size` categories named `<id><n>`.
pub(crate) fn unlabelled_dimension(id: &str, size: usize) -> Dimension {
    Dimension::new(
        id,
        (0..size).map(|n| format!("{}{}", id.to_lowercase(), n)).collect(),
        HashMap::new(),
    )
}

/// Create a 2x2 year/region Cube with values 10, 20, 30, 40.
pub(crate) fn get_test_cube() -> Cube {
    Cube::new(
        vec![
            dimension("year", &[("2023", "Year 2023"), ("2024", "Year 2024")]).with_label("Year"),
            dimension("region", &[("N", "North"), ("S", "South")]).with_label("Region"),
        ],
        vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0)],
    )
}

/// Create a 2x3 Cube with dimensions A and B and values 0 to 5.
pub(crate) fn get_test_cube_2x3() -> Cube {
    Cube::new(
        vec![unlabelled_dimension("A", 2), unlabelled_dimension("B", 3)],
        (0..6).map(|v| Some(v as f64)).collect(),
    )
}

/// Create a 2x3x4 Cube with dimensions x, y and z, whose values are equal to their offsets.
pub(crate) fn get_test_cube_3d() -> Cube {
    Cube::new(
        vec![
            unlabelled_dimension("x", 2),
            unlabelled_dimension("y", 3),
            unlabelled_dimension("z", 4),
        ],
        (0..24).map(|v| Some(v as f64)).collect(),
    )
}

/// A JSON-stat 2.0 dataset equivalent to [get_test_cube].
pub(crate) const TEST_DATASET_JSON: &str = r#"{
    "version": "2.0",
    "class": "dataset",
    "label": "Population by year and region",
    "source": "Test Office",
    "updated": "2024-06-01T00:00:00Z",
    "id": ["year", "region"],
    "size": [2, 2],
    "dimension": {
        "year": {
            "label": "Year",
            "category": {
                "index": ["2023", "2024"],
                "label": {"2023": "Year 2023", "2024": "Year 2024"}
            }
        },
        "region": {
            "label": "Region",
            "category": {
                "index": {"N": 0, "S": 1},
                "label": {"N": "North", "S": "South"}
            }
        }
    },
    "value": [10, 20, 30, 40]
}"#;
