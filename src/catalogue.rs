//! Dataset catalogue search results
//!
//! Facet extraction, filtering and ordering of the results returned by a catalogue search.

use crate::models::{SearchFilter, SearchOrder};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use time::format_description::{well_known::Rfc3339, FormatItem};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Release timestamps without an offset are taken to be UTC.
const RELEASE_WITHOUT_OFFSET: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// A classification (dimension) of a dataset found by a search
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Classification {
    #[serde(rename(deserialize = "ClsCode"))]
    pub code: String,
    #[serde(rename(deserialize = "ClsValue"))]
    pub label: Option<String>,
}

/// One dataset found by a catalogue search
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SearchResult {
    /// Dataset (matrix) code
    #[serde(rename(deserialize = "MtrCode"))]
    pub matrix: String,
    /// Dataset title
    #[serde(rename(deserialize = "MtrTitle"))]
    pub title: Option<String>,
    /// Theme of the dataset
    #[serde(rename(deserialize = "ThmValue"))]
    pub topic: Option<String>,
    /// Subject of the dataset
    #[serde(rename(deserialize = "SbjValue"))]
    pub subject: Option<String>,
    /// Publishing organisation
    #[serde(rename(deserialize = "CprValue"))]
    pub organisation: Option<String>,
    /// Release timestamp, as given by the API
    #[serde(rename(deserialize = "RlsLiveDatetimeFrom"))]
    pub released: Option<String>,
    #[serde(rename(deserialize = "classification"))]
    pub classifications: Option<Vec<Classification>>,
}

impl SearchResult {
    /// Returns the release timestamp, if present and valid.
    pub fn release_time(&self) -> Option<OffsetDateTime> {
        let released = self.released.as_deref()?;
        OffsetDateTime::parse(released, &Rfc3339)
            .or_else(|_| {
                PrimitiveDateTime::parse(released, RELEASE_WITHOUT_OFFSET)
                    .map(PrimitiveDateTime::assume_utc)
            })
            .ok()
    }

    /// Returns the release date in UTC, if the release timestamp is present and valid.
    fn release_date(&self) -> Option<Date> {
        self.release_time()
            .map(|time| time.to_offset(UtcOffset::UTC).date())
    }
}

/// Distinct facet values of a set of search results, in order of first appearance
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Facets {
    pub topics: Vec<String>,
    pub subjects: Vec<String>,
    pub organisations: Vec<String>,
}

fn push_distinct(values: &mut Vec<String>, value: Option<&String>) {
    if let Some(value) = value {
        if !values.contains(value) {
            values.push(value.clone());
        }
    }
}

/// Returns the facets of search results.
pub fn facets(results: &[SearchResult]) -> Facets {
    let mut facets = Facets::default();
    for result in results {
        push_distinct(&mut facets.topics, result.topic.as_ref());
        push_distinct(&mut facets.subjects, result.subject.as_ref());
        push_distinct(&mut facets.organisations, result.organisation.as_ref());
    }
    facets
}

/// Whether a facet value is among the selected ones. Nothing selected matches everything.
fn selected(selection: &[String], value: Option<&String>) -> bool {
    selection.is_empty() || value.map_or(false, |value| selection.contains(value))
}

/// Whether a search result passes a filter.
pub fn matches(result: &SearchResult, filter: &SearchFilter) -> bool {
    let released = match (filter.released_from, filter.released_to) {
        (Some(from), Some(to)) => result
            .release_date()
            .map_or(false, |date| from <= date && date <= to),
        _ => true,
    };
    released
        && selected(&filter.topics, result.topic.as_ref())
        && selected(&filter.subjects, result.subject.as_ref())
        && selected(&filter.organisations, result.organisation.as_ref())
}

/// Compare two results by release, most recent first and unknown releases last.
fn newest_first(a: &SearchResult, b: &SearchResult) -> Ordering {
    match (a.release_time(), b.release_time()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Filtered catalogue search results with the facets of the unfiltered results
#[derive(Debug, PartialEq, Serialize)]
pub struct SearchPage {
    /// Facets of all results
    pub facets: Facets,
    /// Number of results before filtering
    pub total_results: usize,
    /// Results passing the filter
    pub results: Vec<SearchResult>,
}

/// Extract facets from search results, then filter and order them.
pub fn search_page(results: Vec<SearchResult>, filter: &SearchFilter) -> SearchPage {
    let facets = facets(&results);
    let total_results = results.len();
    let mut results: Vec<SearchResult> = results
        .into_iter()
        .filter(|result| matches(result, filter))
        .collect();
    if filter.order == SearchOrder::Newest {
        results.sort_by(newest_first);
    }
    SearchPage {
        facets,
        total_results,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use time::Month;

    const RESULTS_JSON: &str = r#"[
        {"MtrCode": "PEA01", "MtrTitle": "Population Estimates", "ThmValue": "People",
         "SbjValue": "Population", "CprValue": "Central Statistics Office",
         "RlsLiveDatetimeFrom": "2024-08-29T11:00:00Z",
         "classification": [{"ClsCode": "STATISTIC", "ClsValue": "Statistic"}]},
        {"MtrCode": "CPM01", "MtrTitle": "Consumer Price Index", "ThmValue": "Economy",
         "SbjValue": "Prices", "CprValue": "Central Statistics Office",
         "RlsLiveDatetimeFrom": "2024-03-12T11:00:00"},
        {"MtrCode": "EDA01", "MtrTitle": "Enrolments", "ThmValue": "People",
         "SbjValue": "Education", "CprValue": "Department of Education",
         "RlsLiveDatetimeFrom": "not a date"},
        {"MtrCode": "HSA01", "MtrTitle": "Hospital Discharges", "ThmValue": "Health",
         "SbjValue": "Health", "CprValue": "Health Service Executive",
         "RlsLiveDatetimeFrom": "2023-12-31T23:30:00-01:00"}
    ]"#;

    fn results() -> Vec<SearchResult> {
        serde_json::from_str(RESULTS_JSON).unwrap()
    }

    fn codes(page: &SearchPage) -> Vec<&str> {
        page.results
            .iter()
            .map(|result| result.matrix.as_str())
            .collect()
    }

    fn date(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).unwrap()
    }

    #[test]
    fn deserialise_result() {
        let results = results();
        let result = &results[0];
        assert_eq!("PEA01", result.matrix);
        assert_eq!(Some("Population Estimates"), result.title.as_deref());
        assert_eq!(
            Some(vec![Classification {
                code: "STATISTIC".to_string(),
                label: Some("Statistic".to_string()),
            }]),
            result.classifications
        );
        assert_eq!(None, results[1].classifications);
    }

    #[test]
    fn serialise_result_snake_case() {
        let value = serde_json::to_value(&results()[1]).unwrap();
        assert_eq!("CPM01", value["matrix"]);
        assert_eq!("Economy", value["topic"]);
        assert_eq!("2024-03-12T11:00:00", value["released"]);
    }

    #[test]
    fn release_time() {
        let results = results();
        assert_eq!(
            date(2024, Month::August, 29),
            results[0].release_time().unwrap().date()
        );
        // No offset: UTC.
        assert_eq!(
            UtcOffset::UTC,
            results[1].release_time().unwrap().offset()
        );
        assert_eq!(None, results[2].release_time());
        // 23:30 at -01:00 is the next day in UTC.
        assert_eq!(
            Some(date(2024, Month::January, 1)),
            results[3].release_date()
        );
    }

    #[test]
    fn facets_distinct_in_order() {
        let facets = facets(&results());
        assert_eq!(vec!["People", "Economy", "Health"], facets.topics);
        assert_eq!(
            vec!["Population", "Prices", "Education", "Health"],
            facets.subjects
        );
        assert_eq!(
            vec![
                "Central Statistics Office",
                "Department of Education",
                "Health Service Executive"
            ],
            facets.organisations
        );
    }

    #[test]
    fn facets_skip_missing_values() {
        let results: Vec<SearchResult> = serde_json::from_str(r#"[{"MtrCode": "X"}]"#).unwrap();
        assert_eq!(Facets::default(), facets(&results));
    }

    #[test]
    fn no_filter() {
        let page = search_page(results(), &SearchFilter::default());
        assert_eq!(4, page.total_results);
        assert_eq!(vec!["PEA01", "CPM01", "EDA01", "HSA01"], codes(&page));
    }

    #[test]
    fn filter_topics() {
        let filter = SearchFilter {
            topics: vec!["People".to_string()],
            ..Default::default()
        };
        let page = search_page(results(), &filter);
        assert_eq!(vec!["PEA01", "EDA01"], codes(&page));
        // Facets come from all results.
        assert_eq!(3, page.facets.topics.len());
        assert_eq!(4, page.total_results);
    }

    #[test]
    fn filter_facets_combine() {
        let filter = SearchFilter {
            topics: vec!["People".to_string(), "Economy".to_string()],
            organisations: vec!["Central Statistics Office".to_string()],
            ..Default::default()
        };
        let page = search_page(results(), &filter);
        assert_eq!(vec!["PEA01", "CPM01"], codes(&page));
    }

    #[test]
    fn filter_subject_without_match() {
        let filter = SearchFilter {
            subjects: vec!["Transport".to_string()],
            ..Default::default()
        };
        assert!(search_page(results(), &filter).results.is_empty());
    }

    #[test]
    fn filter_release_range_inclusive() {
        let filter = SearchFilter {
            released_from: Some(date(2024, Month::January, 1)),
            released_to: Some(date(2024, Month::March, 12)),
            ..Default::default()
        };
        let page = search_page(results(), &filter);
        assert_eq!(vec!["CPM01", "HSA01"], codes(&page));
    }

    #[test]
    fn filter_release_range_needs_both_ends() {
        let filter = SearchFilter {
            released_from: Some(date(2030, Month::January, 1)),
            ..Default::default()
        };
        assert_eq!(4, search_page(results(), &filter).results.len());
    }

    #[test]
    fn order_newest_first() {
        let filter = SearchFilter {
            order: SearchOrder::Newest,
            ..Default::default()
        };
        let page = search_page(results(), &filter);
        assert_eq!(vec!["PEA01", "CPM01", "HSA01", "EDA01"], codes(&page));
    }
}
