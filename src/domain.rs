use std::fmt;
use std::io::Error;

use clap::Parser;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use tracing_error::SpanTrace;

pub const DEFAULT_EXPORT_NAME: &str = "matches_1to1.csv";
pub const DEFAULT_MOUNT_POINT: &str = "main";

pub const HELP_TEXT: &str = "\
Tab / Shift-Tab   Move focus between search, column filters and export
<typing>          Edit the focused filter, the table updates on every key
Esc               Clear the focused filter (closes this popup)
Ctrl-S            Sort by the focused column (again to reverse)
Ctrl-R            Reset sort order
Ctrl-E / Enter    Export the full dataset as CSV (Enter on export)
Ctrl-Y            Copy selected cell
Ctrl-L            Copy selected row
Up / Down         Move the row selection
PgUp / PgDown     Move the row selection by one page
Ctrl-Home / End   Jump to the first / last row
Mouse click       Sort by a header label, focus a column filter, export via the button
F1                Show this help
Ctrl-Q            Quit";

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Search, filter, sort and export tabular data in the terminal.")]
pub struct TVConfig {
    /// Data file to load (csv, parquet, arrow/ipc/feather)
    pub path: String,

    /// Named containers of the screen, comma separated
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_MOUNT_POINT)]
    pub containers: Vec<String>,

    /// Container the table is mounted into, one of --containers
    #[arg(long, default_value = DEFAULT_MOUNT_POINT)]
    pub mount: String,

    /// Explicit column order, comma separated. Defaults to the file schema.
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Display name of a column, as KEY=LABEL
    #[arg(long = "header", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Formatter of a column, as KEY=NAME (currency, percent, upper, lower, bold, date)
    #[arg(long = "format", value_parser = parse_key_value)]
    pub formats: Vec<(String, String)>,

    /// Initial global search term
    #[arg(long)]
    pub search: Option<String>,

    /// Initial filter of a column, as KEY=TERM
    #[arg(long = "filter", value_parser = parse_key_value)]
    pub filters: Vec<(String, String)>,

    /// Render the markup produced for this column instead of showing it as text
    #[arg(long = "raw")]
    pub raw_markup: Vec<String>,

    /// Directory exported files are written to
    #[arg(long, default_value = ".")]
    pub output_dir: String,

    /// File name of the csv export
    #[arg(long, default_value = DEFAULT_EXPORT_NAME)]
    pub export_name: String,

    #[arg(long, default_value_t = 40)]
    pub max_column_width: usize,

    /// Milliseconds to wait for terminal events per frame
    #[arg(long, default_value_t = 100)]
    pub event_poll_time: u64,

    #[arg(long, default_value = "dtv.log")]
    pub log_file: String,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got \"{s}\"")),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Help,
    Exit,
    Input(KeyEvent),
    ClearInput,
    FocusNext,
    FocusPrevious,
    SortFocusedColumn,
    HeaderClicked(usize),
    FilterClicked(usize),
    ClearSort,
    Export,
    CopyCell,
    CopyRow,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Resize(usize, usize),
}

/// Failure of a column formatter. Aborts the redraw of the rows after it.
#[derive(Debug)]
pub struct FormatError {
    pub column: Option<String>,
    pub row: Option<usize>,
    pub message: String,
    span_trace: SpanTrace,
}

impl FormatError {
    pub fn new(message: impl Into<String>) -> Self {
        FormatError {
            column: None,
            row: None,
            message: message.into(),
            span_trace: SpanTrace::capture(),
        }
    }

    pub(crate) fn located(mut self, column: &str, row: usize) -> Self {
        self.column = Some(column.to_string());
        self.row = Some(row);
        self
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.column, self.row) {
            (Some(column), Some(row)) => {
                write!(f, "formatting column \"{column}\" of row {row} failed: {}", self.message)
            }
            _ => write!(f, "formatting failed: {}", self.message),
        }
    }
}

#[derive(Debug)]
pub enum TVError {
    IoError(Error),
    PolarsError(PolarsError),
    CsvError(csv::Error),
    Format(FormatError),
    LoadingFailed(String),
    MountPointNotFound(String),
    UnknownColumn(String),
    SchemaMismatch { row: usize, column: String },
    EmptyDataset,
    InvalidArgument(String),
    TracingInit(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl fmt::Display for TVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TVError::IoError(e) => write!(f, "io error: {e}"),
            TVError::PolarsError(e) => write!(f, "data error: {e}"),
            TVError::CsvError(e) => write!(f, "csv error: {e}"),
            TVError::Format(e) => write!(f, "{e}"),
            TVError::LoadingFailed(reason) => write!(f, "loading failed: {reason}"),
            TVError::MountPointNotFound(id) => write!(f, "Container with id '{id}' not found"),
            TVError::UnknownColumn(key) => write!(f, "unknown column \"{key}\""),
            TVError::SchemaMismatch { row, column } => {
                write!(f, "record {row} has no value for column \"{column}\"")
            }
            TVError::EmptyDataset => write!(f, "dataset has no columns"),
            TVError::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
            TVError::TracingInit(reason) => write!(f, "could not set up logging: {reason}"),
            TVError::FileNotFound => write!(f, "file not found"),
            TVError::PermissionDenied => write!(f, "permission denied"),
            TVError::UnknownFileType => write!(f, "unknown file type"),
        }
    }
}

impl std::error::Error for TVError {}

impl From<Error> for TVError {
    fn from(err: Error) -> Self {
        TVError::IoError(err)
    }
}

impl From<PolarsError> for TVError {
    fn from(err: PolarsError) -> Self {
        TVError::PolarsError(err)
    }
}

impl From<csv::Error> for TVError {
    fn from(err: csv::Error) -> Self {
        TVError::CsvError(err)
    }
}

impl From<FormatError> for TVError {
    fn from(err: FormatError) -> Self {
        TVError::Format(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_arguments() {
        assert_eq!(
            parse_key_value("price=Price ($)"),
            Ok(("price".to_string(), "Price ($)".to_string()))
        );
        assert_eq!(
            parse_key_value("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
        assert!(parse_key_value("=label").is_err());
        assert!(parse_key_value("nolabel").is_err());
    }

    #[test]
    fn cli_defaults() {
        let config = TVConfig::parse_from(["dtv", "data.csv"]);
        assert_eq!(config.mount, DEFAULT_MOUNT_POINT);
        assert_eq!(config.containers, vec![DEFAULT_MOUNT_POINT]);
        assert_eq!(config.search, None);
        assert_eq!(config.export_name, DEFAULT_EXPORT_NAME);
        assert!(config.columns.is_empty());

        let config = TVConfig::parse_from([
            "dtv",
            "data.csv",
            "--columns",
            "a,b",
            "--header",
            "a=Alpha",
            "--format",
            "b=currency",
            "--raw",
            "b",
            "--containers",
            "main,sidebar",
            "--mount",
            "sidebar",
            "--search",
            "x",
            "--filter",
            "a=1",
        ]);
        assert_eq!(config.containers, vec!["main", "sidebar"]);
        assert_eq!(config.mount, "sidebar");
        assert_eq!(config.search.as_deref(), Some("x"));
        assert_eq!(config.filters, vec![("a".to_string(), "1".to_string())]);
        assert_eq!(config.columns, vec!["a", "b"]);
        assert_eq!(config.headers, vec![("a".to_string(), "Alpha".to_string())]);
        assert_eq!(config.formats, vec![("b".to_string(), "currency".to_string())]);
        assert_eq!(config.raw_markup, vec!["b"]);
    }

    #[test]
    fn mount_error_message() {
        let err = TVError::MountPointNotFound("sidebar".into());
        assert_eq!(err.to_string(), "Container with id 'sidebar' not found");
    }
}
