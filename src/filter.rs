use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Instant;
use tracing::trace;

use crate::dataset::{Dataset, Record};

/// Global search term plus one substring filter per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    global: String,
    columns: HashMap<String, String>,
}

impl FilterState {
    pub fn global(&self) -> &str {
        &self.global
    }

    pub fn column(&self, key: &str) -> &str {
        self.columns.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set_global(&mut self, term: impl Into<String>) {
        self.global = term.into();
    }

    pub fn set_column(&mut self, key: impl Into<String>, term: impl Into<String>) {
        let term = term.into();
        let key = key.into();
        if term.is_empty() {
            self.columns.remove(&key);
        } else {
            self.columns.insert(key, term);
        }
    }
}

/// Lower cased terms, prepared once per filter run.
struct Terms<'a> {
    global: String,
    columns: Vec<(&'a str, String)>,
}

impl<'a> Terms<'a> {
    fn new(columns: &'a [String], state: &FilterState) -> Self {
        Terms {
            global: state.global.to_lowercase(),
            columns: columns
                .iter()
                .map(|key| (key.as_str(), state.column(key).to_lowercase()))
                .filter(|(_, term)| !term.is_empty())
                .collect(),
        }
    }
}

fn contains(record: &Record, key: &str, term: &str) -> bool {
    record.text(key).to_lowercase().contains(term)
}

fn matches(record: &Record, columns: &[String], terms: &Terms) -> bool {
    let global_match =
        terms.global.is_empty() || columns.iter().any(|key| contains(record, key, &terms.global));
    let column_match = terms
        .columns
        .iter()
        .all(|(key, term)| contains(record, key, term));
    global_match && column_match
}

/// Indices of the records passing the filter state, in dataset order.
pub fn apply(dataset: &Dataset, columns: &[String], state: &FilterState) -> Vec<usize> {
    let start_time = Instant::now();
    let terms = Terms::new(columns, state);

    let indices: Vec<usize> = dataset
        .records()
        .par_iter()
        .enumerate()
        .filter(|(_, record)| matches(record, columns, &terms))
        .map(|(idx, _)| idx)
        .collect();

    trace!(
        "Filter matched {}/{} records in {}ms",
        indices.len(),
        dataset.len(),
        start_time.elapsed().as_millis()
    );
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;

    fn people() -> (Dataset, Vec<String>) {
        let rows: [(&str, &str, i64); 5] = [
            ("Alice", "Berlin", 31),
            ("Bob", "Paris", 27),
            ("alina", "Bern", 45),
            ("Carl", "Lisbon", 31),
            ("Dora", "berlin", 52),
        ];
        let records = rows
            .iter()
            .map(|(name, city, age)| {
                Record::from_iter([
                    ("name", Value::from(*name)),
                    ("city", Value::from(*city)),
                    ("age", Value::from(*age)),
                ])
            })
            .collect();
        let schema: Vec<String> = vec!["name".into(), "city".into(), "age".into()];
        (Dataset::new(schema.clone(), records).unwrap(), schema)
    }

    #[test]
    fn no_filters_keep_everything() {
        let (dataset, columns) = people();
        let state = FilterState::default();
        assert_eq!(state, FilterState::default());
        assert_eq!(apply(&dataset, &columns, &state), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn global_term_matches_any_column_case_insensitive() {
        let (dataset, columns) = people();
        let mut state = FilterState::default();
        state.set_global("BER");
        let rows = apply(&dataset, &columns, &state);
        assert_eq!(rows, vec![0, 2, 4]);
        for idx in rows {
            let record = &dataset.records()[idx];
            assert!(
                columns
                    .iter()
                    .any(|c| record.text(c).to_lowercase().contains("ber"))
            );
        }
    }

    #[test]
    fn global_term_matches_stringified_numbers() {
        let (dataset, columns) = people();
        let mut state = FilterState::default();
        state.set_global("31");
        assert_eq!(apply(&dataset, &columns, &state), vec![0, 3]);
    }

    #[test]
    fn column_filters_are_anded() {
        let (dataset, columns) = people();
        let mut state = FilterState::default();
        state.set_column("name", "al");
        state.set_column("age", "3");
        assert_eq!(apply(&dataset, &columns, &state), vec![0]);
    }

    #[test]
    fn combined_filters_are_the_intersection() {
        let (dataset, columns) = people();

        let mut global_only = FilterState::default();
        global_only.set_global("b");
        let mut column_only = FilterState::default();
        column_only.set_column("age", "31");
        let mut both = global_only.clone();
        both.set_column("age", "31");

        let a = apply(&dataset, &columns, &global_only);
        let b = apply(&dataset, &columns, &column_only);
        let expected: Vec<usize> = a.iter().copied().filter(|i| b.contains(i)).collect();
        assert_eq!(apply(&dataset, &columns, &both), expected);
        assert_eq!(expected, vec![0, 3]);
    }

    #[test]
    fn empty_column_term_is_removed() {
        let mut state = FilterState::default();
        state.set_column("name", "x");
        assert_ne!(state, FilterState::default());
        state.set_column("name", "");
        assert_eq!(state, FilterState::default());
        assert_eq!(state.column("name"), "");
    }

    #[test]
    fn filters_on_columns_outside_the_view_are_ignored() {
        let (dataset, _) = people();
        let columns = vec!["name".to_string()];
        let mut state = FilterState::default();
        state.set_global("paris");
        assert!(apply(&dataset, &columns, &state).is_empty());
    }
}
