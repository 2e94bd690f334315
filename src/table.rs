use ratatui::crossterm::event::KeyEvent;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::columns::{Formatter, TableOptions};
use crate::dataset::{Dataset, Record};
use crate::domain::TVError;
use crate::export::{self, CSV_MIME, Downloader};
use crate::filter::{self, FilterState};
use crate::inputter::Inputter;
use crate::markup::CellContent;
use crate::sort::{ColumnKind, SortState};
use crate::surface::Screen;

pub const GLOBAL_SEARCH_PLACEHOLDER: &str = "Global search across all columns...";
pub const EXPORT_LABEL: &str = "Export CSV";

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow {
    /// Index of the record in the dataset
    pub record_idx: usize,
    pub cells: Vec<CellContent>,
}

/// Interactive table over one dataset: header, filters, body and export.
pub struct DataTable {
    dataset: Dataset,
    columns: Vec<String>,
    headers: Vec<HeaderCell>,
    global_search: Inputter,
    column_filters: Vec<Inputter>,
    formatters: HashMap<String, Formatter>,
    raw_markup: HashSet<String>,
    export_filename: String,
    filter: FilterState,
    sort: Option<SortState>,
    body: Vec<RenderedRow>,
}

impl fmt::Debug for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTable")
            .field("name", &self.dataset.name())
            .field("columns", &self.columns)
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("rows", &self.body.len())
            .finish()
    }
}

impl DataTable {
    /// Builds a table and mounts it, replacing the mount point's content.
    /// Nothing is touched when the mount point is missing or the build fails.
    pub fn mount<'s>(
        dataset: Dataset,
        mount_id: &str,
        options: TableOptions,
        screen: &'s mut Screen,
    ) -> Result<&'s mut DataTable, TVError> {
        if !screen.contains(mount_id) {
            return Err(TVError::MountPointNotFound(mount_id.to_string()));
        }
        let table = DataTable::build(dataset, options)?;
        info!(
            "Mounted \"{}\" at \"{mount_id}\" ({} records, {} columns)",
            table.dataset.name(),
            table.dataset.len(),
            table.columns.len()
        );
        screen.replace(mount_id, table)
    }

    pub fn build(dataset: Dataset, options: TableOptions) -> Result<Self, TVError> {
        let TableOptions {
            columns,
            headers,
            formatters,
            raw_markup,
            export_filename,
        } = options;

        let columns = if columns.is_empty() {
            dataset.schema().to_vec()
        } else {
            columns
        };
        if columns.is_empty() {
            return Err(TVError::EmptyDataset);
        }
        let known = |key: &String| dataset.schema().contains(key);
        if let Some(unknown) = columns
            .iter()
            .chain(headers.keys())
            .chain(formatters.keys())
            .chain(raw_markup.iter())
            .find(|key| !known(*key))
        {
            return Err(TVError::UnknownColumn(unknown.clone()));
        }

        let headers: Vec<HeaderCell> = columns
            .iter()
            .map(|key| HeaderCell {
                key: key.clone(),
                label: headers.get(key).unwrap_or(key).clone(),
            })
            .collect();
        let column_filters = headers
            .iter()
            .map(|h| Inputter::with_placeholder(format!("Filter {}...", h.label)))
            .collect();

        let mut table = DataTable {
            dataset,
            columns,
            headers,
            global_search: Inputter::with_placeholder(GLOBAL_SEARCH_PLACEHOLDER),
            column_filters,
            formatters,
            raw_markup,
            export_filename,
            filter: FilterState::default(),
            sort: None,
            body: Vec::new(),
        };
        table.refresh()?;
        Ok(table)
    }

    pub fn name(&self) -> &str {
        self.dataset.name()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn headers(&self) -> &[HeaderCell] {
        &self.headers
    }

    pub fn body(&self) -> &[RenderedRow] {
        &self.body
    }

    pub fn global_search(&self) -> &Inputter {
        &self.global_search
    }

    pub fn column_filter(&self, column: usize) -> Option<&Inputter> {
        self.column_filters.get(column)
    }

    pub fn export_label(&self) -> &str {
        EXPORT_LABEL
    }

    pub fn sort_state(&self) -> Option<SortState> {
        self.sort
    }

    pub fn set_global_filter(&mut self, term: &str) -> Result<(), TVError> {
        self.global_search.set(term);
        self.filter.set_global(term);
        self.refresh()
    }

    pub fn set_column_filter(&mut self, column: usize, term: &str) -> Result<(), TVError> {
        let key = self.column_key(column)?.to_string();
        self.column_filters[column].set(term);
        self.filter.set_column(key, term);
        self.refresh()
    }

    pub fn clear_global_filter(&mut self) -> Result<(), TVError> {
        self.global_search.clear();
        self.filter.set_global("");
        self.refresh()
    }

    pub fn clear_column_filter(&mut self, column: usize) -> Result<(), TVError> {
        let key = self.column_key(column)?.to_string();
        self.column_filters[column].clear();
        self.filter.set_column(key, "");
        self.refresh()
    }

    /// Feeds a key into the global search box, refreshing on every change.
    pub fn edit_global_filter(&mut self, key: KeyEvent) -> Result<(), TVError> {
        if self.global_search.read(key) {
            self.filter.set_global(self.global_search.value());
            self.refresh()?;
        }
        Ok(())
    }

    pub fn edit_column_filter(&mut self, column: usize, key: KeyEvent) -> Result<(), TVError> {
        let col_key = self.column_key(column)?.to_string();
        let input = &mut self.column_filters[column];
        if input.read(key) {
            self.filter.set_column(col_key, input.value());
            self.refresh()?;
        }
        Ok(())
    }

    /// Header activation: ascending first, reversing on repeated activation.
    pub fn sort_by_column(&mut self, column: usize) -> Result<(), TVError> {
        self.column_key(column)?;
        self.sort = Some(SortState::activate(self.sort, column));
        debug!("Sorting by {:?}", self.sort);
        self.refresh()
    }

    pub fn clear_sort(&mut self) -> Result<(), TVError> {
        self.sort = None;
        self.refresh()
    }

    /// Exports the original dataset, whatever the filters show.
    pub fn export(&self, downloader: &mut dyn Downloader) -> Result<PathBuf, TVError> {
        let csv = export::to_csv(&self.dataset)?;
        downloader.download(&self.export_filename, CSV_MIME, &csv)
    }

    /// Recomputes the visible rows from scratch and redraws the body.
    /// A failing formatter aborts the redraw, rows before it stay.
    pub fn refresh(&mut self) -> Result<(), TVError> {
        let start_time = Instant::now();
        let indices = filter::apply(&self.dataset, &self.columns, &self.filter);

        self.body.clear();
        for (row_idx, &record_idx) in indices.iter().enumerate() {
            let record = &self.dataset.records()[record_idx];
            let cells = self.render_cells(record, row_idx)?;
            self.body.push(RenderedRow { record_idx, cells });
        }

        if let Some(sort) = self.sort {
            let column = sort.column;
            let mut keyed: Vec<(String, RenderedRow)> = self
                .body
                .drain(..)
                .map(|row| (row.cells[column].display_text(), row))
                .collect();
            let kind = ColumnKind::detect(keyed.iter().map(|(text, _)| text.as_str()));
            debug!("Sorting column {column} as {kind:?}");
            // stable, ties keep dataset order
            keyed.sort_by(|(a, _), (b, _)| sort.direction.apply(kind.compare(a, b)));
            self.body = keyed.into_iter().map(|(_, row)| row).collect();
        }

        trace!(
            "Rendered {}/{} rows in {}ms",
            self.body.len(),
            self.dataset.len(),
            start_time.elapsed().as_millis()
        );
        Ok(())
    }

    fn render_cells(&self, record: &Record, row_idx: usize) -> Result<Vec<CellContent>, TVError> {
        self.columns
            .iter()
            .map(|key| -> Result<CellContent, TVError> {
                let content = match (self.formatters.get(key), record.get(key)) {
                    (Some(formatter), Some(value)) => formatter(value, record, row_idx)
                        .map_err(|e| e.located(key, row_idx))?,
                    (_, value) => CellContent::Text(value.map(|v| v.to_string()).unwrap_or_default()),
                };
                Ok(match content {
                    CellContent::Markup(m) if !self.raw_markup.contains(key) => CellContent::Text(m),
                    content => content,
                })
            })
            .collect()
    }

    /// Position of a column key in the view.
    pub fn column_index(&self, key: &str) -> Result<usize, TVError> {
        self.columns
            .iter()
            .position(|c| c == key)
            .ok_or_else(|| TVError::UnknownColumn(key.to_string()))
    }

    fn column_key(&self, column: usize) -> Result<&str, TVError> {
        self.columns
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| TVError::InvalidArgument(format!("no column at position {column}")))
    }
}
