//! Table views of a flattened cube
//!
//! Searching, filtering, sorting and paging of flattened rows, and their export as CSV.

use crate::cube::{Cube, Row, VALUE_COLUMN};
use crate::error::StatCubeError;
use crate::models::{SortDirection, TableQuery};

use serde::Serialize;
use std::cmp::Ordering;

/// A table column
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    /// Column identifier: a dimension identifier or `Value`
    pub id: String,
    /// Column header
    pub name: String,
}

/// Returns the columns of the flattened cube: one per dimension in dimension order, then the
/// value.
pub fn columns(cube: &Cube) -> Result<Vec<Column>, StatCubeError> {
    let mut columns: Vec<Column> = cube
        .ordered_dimensions()?
        .into_iter()
        .map(|dimension| Column {
            id: dimension.id.clone(),
            name: dimension.name().to_string(),
        })
        .collect();
    columns.push(Column {
        id: VALUE_COLUMN.to_string(),
        name: VALUE_COLUMN.to_string(),
    });
    Ok(columns)
}

/// A table cell: a category label or a cell value
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableCell {
    Label(String),
    Value(Option<f64>),
}

/// One page of a table view
#[derive(Debug, PartialEq, Serialize)]
pub struct TablePage {
    /// Visible columns
    pub columns: Vec<Column>,
    /// Visible cells of the rows on the page
    pub rows: Vec<Vec<TableCell>>,
    /// Number of rows before searching and filtering
    pub total_rows: usize,
    /// Number of rows after searching and filtering
    pub matching_rows: usize,
    /// Page number, starting at 1
    pub page: usize,
    /// Number of pages, at least 1
    pub page_count: usize,
}

/// A flattened cube with its columns
#[derive(Debug)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

/// Returns the text of a column of a row, used for searching, filtering and sorting.
fn text(row: &Row, column: &str) -> String {
    if column == VALUE_COLUMN {
        row.value.map(|value| value.to_string()).unwrap_or_default()
    } else {
        row.label(column).unwrap_or_default().to_string()
    }
}

/// Compare two rows on a column. Values compare numerically with missing values last, labels
/// compare case-insensitively.
fn compare(a: &Row, b: &Row, column: &str, direction: SortDirection) -> Ordering {
    let ordering = if column == VALUE_COLUMN {
        match (a.value, b.value) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    } else {
        text(a, column)
            .to_lowercase()
            .cmp(&text(b, column).to_lowercase())
    };
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Quote a CSV field if it contains a separator, a quote or a newline.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl Table {
    /// Flatten a cube into a table.
    pub fn new(cube: &Cube) -> Result<Self, StatCubeError> {
        Ok(Table {
            columns: columns(cube)?,
            rows: cube.flatten()?,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_column(&self, column: &str) -> Result<(), StatCubeError> {
        if self.columns.iter().any(|candidate| candidate.id == column) {
            Ok(())
        } else {
            Err(StatCubeError::UnknownColumn {
                column: column.to_string(),
            })
        }
    }

    /// Returns the visible columns, in table order.
    fn visible_columns(&self, query: &TableQuery) -> Result<Vec<&Column>, StatCubeError> {
        match &query.columns {
            Some(ids) => {
                for id in ids {
                    self.check_column(id)?;
                }
                Ok(self
                    .columns
                    .iter()
                    .filter(|column| ids.contains(&column.id))
                    .collect())
            }
            None => Ok(self.columns.iter().collect()),
        }
    }

    /// Returns the rows matching the search and filters of a query, sorted.
    fn matching_rows(&self, query: &TableQuery) -> Result<Vec<&Row>, StatCubeError> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(str::to_lowercase);
        let mut filters = Vec::with_capacity(query.filters.len());
        for (column, filter) in &query.filters {
            self.check_column(column)?;
            let filter = filter.trim();
            if !filter.is_empty() {
                filters.push((column.as_str(), filter.to_lowercase()));
            }
        }
        if let Some(sort) = &query.sort {
            self.check_column(&sort.column)?;
        }

        let mut rows: Vec<&Row> = self
            .rows
            .iter()
            .filter(|row| match &search {
                Some(search) => self
                    .columns
                    .iter()
                    .any(|column| text(row, &column.id).to_lowercase().contains(search)),
                None => true,
            })
            .filter(|row| {
                filters
                    .iter()
                    .all(|(column, filter)| text(row, column).to_lowercase().contains(filter))
            })
            .collect();

        if let Some(sort) = &query.sort {
            rows.sort_by(|a, b| compare(a, b, &sort.column, sort.direction));
        }
        Ok(rows)
    }

    /// Returns the page of rows selected by a query.
    ///
    /// A page beyond the last one is empty.
    pub fn page(&self, query: &TableQuery) -> Result<TablePage, StatCubeError> {
        let columns = self.visible_columns(query)?;
        let rows = self.matching_rows(query)?;
        let page_size = query.page_size.max(1);
        let page_count = rows.len().div_ceil(page_size).max(1);
        let start = query.page.saturating_sub(1).saturating_mul(page_size);
        let page_rows = rows
            .iter()
            .skip(start)
            .take(page_size)
            .map(|row| {
                columns
                    .iter()
                    .map(|column| {
                        if column.id == VALUE_COLUMN {
                            TableCell::Value(row.value)
                        } else {
                            TableCell::Label(text(row, &column.id))
                        }
                    })
                    .collect()
            })
            .collect();
        Ok(TablePage {
            columns: columns.into_iter().cloned().collect(),
            rows: page_rows,
            total_rows: self.rows.len(),
            matching_rows: rows.len(),
            page: query.page,
            page_count,
        })
    }

    /// Export the rows matching a query as CSV, ignoring paging.
    ///
    /// The first line holds the column headers. Missing values are empty fields.
    pub fn to_csv(&self, query: &TableQuery) -> Result<String, StatCubeError> {
        let columns = self.visible_columns(query)?;
        let rows = self.matching_rows(query)?;
        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(
            columns
                .iter()
                .map(|column| csv_field(&column.name))
                .collect::<Vec<String>>()
                .join(","),
        );
        for row in rows {
            lines.push(
                columns
                    .iter()
                    .map(|column| csv_field(&text(row, &column.id)))
                    .collect::<Vec<String>>()
                    .join(","),
            );
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sort;
    use crate::test_utils;

    fn table() -> Table {
        Table::new(&test_utils::get_test_cube()).unwrap()
    }

    fn sorted(column: &str, direction: SortDirection) -> TableQuery {
        TableQuery {
            sort: Some(Sort {
                column: column.to_string(),
                direction,
            }),
            ..Default::default()
        }
    }

    fn values(page: &TablePage) -> Vec<Option<f64>> {
        page.rows
            .iter()
            .map(|row| match row.last() {
                Some(TableCell::Value(value)) => *value,
                cell => panic!("expected value cell, got {:?}", cell),
            })
            .collect()
    }

    #[test]
    fn columns_in_dimension_order() {
        let columns = columns(&test_utils::get_test_cube()).unwrap();
        assert_eq!(
            vec![
                Column {
                    id: "year".to_string(),
                    name: "Year".to_string()
                },
                Column {
                    id: "region".to_string(),
                    name: "Region".to_string()
                },
                Column {
                    id: "Value".to_string(),
                    name: "Value".to_string()
                },
            ],
            columns
        );
    }

    #[test]
    fn columns_without_label_use_id() {
        let columns = columns(&test_utils::get_test_cube_2x3()).unwrap();
        assert_eq!("A", columns[0].name);
    }

    #[test]
    fn page_default() {
        let table = table();
        assert_eq!(4, table.len());
        let page = table.page(&TableQuery::default()).unwrap();
        assert_eq!(3, page.columns.len());
        assert_eq!(4, page.total_rows);
        assert_eq!(4, page.matching_rows);
        assert_eq!(1, page.page);
        assert_eq!(1, page.page_count);
        assert_eq!(
            vec![
                TableCell::Label("Year 2023".to_string()),
                TableCell::Label("North".to_string()),
                TableCell::Value(Some(10.0)),
            ],
            page.rows[0]
        );
    }

    #[test]
    fn page_slices() {
        let table = Table::new(&test_utils::get_test_cube_3d()).unwrap();
        let query = TableQuery {
            page: 3,
            page_size: 10,
            ..Default::default()
        };
        let page = table.page(&query).unwrap();
        assert_eq!(3, page.page_count);
        assert_eq!(4, page.rows.len());
        assert_eq!(Some(20.0), values(&page)[0]);
    }

    #[test]
    fn page_beyond_last() {
        let query = TableQuery {
            page: 5,
            ..Default::default()
        };
        let page = table().page(&query).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(1, page.page_count);
    }

    #[test]
    fn search_is_case_insensitive() {
        let query = TableQuery {
            search: Some("SOUTH".to_string()),
            ..Default::default()
        };
        let page = table().page(&query).unwrap();
        assert_eq!(2, page.matching_rows);
        assert_eq!(4, page.total_rows);
        assert_eq!(vec![Some(20.0), Some(40.0)], values(&page));
    }

    #[test]
    fn search_matches_values() {
        let query = TableQuery {
            search: Some("30".to_string()),
            ..Default::default()
        };
        let page = table().page(&query).unwrap();
        assert_eq!(vec![Some(30.0)], values(&page));
    }

    #[test]
    fn filters() {
        let mut query = TableQuery::default();
        query
            .filters
            .insert("year".to_string(), "2024".to_string());
        query.filters.insert("region".to_string(), " ".to_string());
        let page = table().page(&query).unwrap();
        assert_eq!(vec![Some(30.0), Some(40.0)], values(&page));
    }

    #[test]
    fn filter_unknown_column() {
        let mut query = TableQuery::default();
        query.filters.insert("sex".to_string(), "M".to_string());
        match table().page(&query).unwrap_err() {
            StatCubeError::UnknownColumn { column } => assert_eq!("sex", column),
            err => panic!("expected unknown column error, got {:?}", err),
        }
    }

    #[test]
    fn sort_values_descending() {
        let page = table()
            .page(&sorted("Value", SortDirection::Descending))
            .unwrap();
        assert_eq!(
            vec![Some(40.0), Some(30.0), Some(20.0), Some(10.0)],
            values(&page)
        );
    }

    #[test]
    fn sort_values_nulls_last() {
        let mut cube = test_utils::get_test_cube();
        cube.values[2] = None;
        let table = Table::new(&cube).unwrap();
        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let page = table.page(&sorted("Value", direction)).unwrap();
            assert_eq!(None, values(&page)[3]);
        }
    }

    #[test]
    fn sort_labels_is_stable() {
        let page = table()
            .page(&sorted("region", SortDirection::Descending))
            .unwrap();
        assert_eq!(
            vec![Some(20.0), Some(40.0), Some(10.0), Some(30.0)],
            values(&page)
        );
    }

    #[test]
    fn sort_unknown_column() {
        assert!(matches!(
            table().page(&sorted("sex", SortDirection::Ascending)),
            Err(StatCubeError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn visible_columns() {
        let query = TableQuery {
            columns: Some(vec!["Value".to_string(), "region".to_string()]),
            ..Default::default()
        };
        let page = table().page(&query).unwrap();
        assert_eq!(
            vec!["region", "Value"],
            page.columns
                .iter()
                .map(|column| column.id.as_str())
                .collect::<Vec<&str>>()
        );
        assert_eq!(
            vec![
                TableCell::Label("North".to_string()),
                TableCell::Value(Some(10.0))
            ],
            page.rows[0]
        );
    }

    #[test]
    fn table_page_serialises() {
        let query = TableQuery {
            page_size: 1,
            ..Default::default()
        };
        let page = table().page(&query).unwrap();
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(
            serde_json::json!([["Year 2023", "North", 10.0]]),
            json["rows"]
        );
        assert_eq!(4, json["page_count"]);
    }

    #[test]
    fn csv_export() {
        let mut cube = test_utils::get_test_cube();
        cube.values[3] = None;
        let table = Table::new(&cube).unwrap();
        assert_eq!(
            "Year,Region,Value\n\
             Year 2023,North,10\n\
             Year 2023,South,20\n\
             Year 2024,North,30\n\
             Year 2024,South,",
            table.to_csv(&TableQuery::default()).unwrap()
        );
    }

    #[test]
    fn csv_export_ignores_paging() {
        let query = TableQuery {
            page_size: 1,
            search: Some("north".to_string()),
            columns: Some(vec!["year".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            "Year\nYear 2023\nYear 2024",
            table().to_csv(&query).unwrap()
        );
    }

    #[test]
    fn csv_quoting() {
        assert_eq!("plain", csv_field("plain"));
        assert_eq!("\"Dublin, City\"", csv_field("Dublin, City"));
        assert_eq!("\"say \"\"hi\"\"\"", csv_field("say \"hi\""));
        assert_eq!("\"two\nlines\"", csv_field("two\nlines"));
        assert_eq!("\"carriage\rreturn\"", csv_field("carriage\rreturn"));
        assert_eq!("\"crlf\r\n\"", csv_field("crlf\r\n"));
    }
}
