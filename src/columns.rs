use derive_setters::Setters;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::dataset::{Record, Value};
use crate::domain::{DEFAULT_EXPORT_NAME, FormatError, TVConfig, TVError};
use crate::markup::CellContent;
use crate::sort::parse_date;

/// Renders a cell from its value, the whole record and the row position in the view.
pub type Formatter = Box<dyn Fn(&Value, &Record, usize) -> Result<CellContent, FormatError>>;

/// Column configuration of a table.
#[derive(Setters)]
#[setters(into)]
pub struct TableOptions {
    /// Columns in display order. Empty means the dataset schema.
    pub columns: Vec<String>,
    /// Display names by column key.
    pub headers: HashMap<String, String>,
    #[setters(skip)]
    pub formatters: HashMap<String, Formatter>,
    /// Columns whose formatter output is interpreted as markup.
    pub raw_markup: HashSet<String>,
    pub export_filename: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            columns: Vec::new(),
            headers: HashMap::new(),
            formatters: HashMap::new(),
            raw_markup: HashSet::new(),
            export_filename: DEFAULT_EXPORT_NAME.to_string(),
        }
    }
}

impl fmt::Debug for TableOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableOptions")
            .field("columns", &self.columns)
            .field("headers", &self.headers)
            .field("formatters", &self.formatters.keys().collect::<Vec<_>>())
            .field("raw_markup", &self.raw_markup)
            .field("export_filename", &self.export_filename)
            .finish()
    }
}

impl TableOptions {
    pub fn header(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.headers.insert(key.into(), label.into());
        self
    }

    pub fn formatter<F>(mut self, key: impl Into<String>, formatter: F) -> Self
    where
        F: Fn(&Value, &Record, usize) -> Result<CellContent, FormatError> + 'static,
    {
        self.formatters.insert(key.into(), Box::new(formatter));
        self
    }

    pub fn raw(mut self, key: impl Into<String>) -> Self {
        self.raw_markup.insert(key.into());
        self
    }

    pub fn from_config(config: &TVConfig) -> Result<Self, TVError> {
        let mut options = TableOptions::default()
            .columns(config.columns.clone())
            .export_filename(config.export_name.clone());
        for (key, label) in &config.headers {
            options = options.header(key, label);
        }
        for (key, name) in &config.formats {
            options.formatters.insert(key.clone(), builtin(name)?);
        }
        for key in &config.raw_markup {
            options = options.raw(key);
        }
        Ok(options)
    }
}

fn number(value: &Value) -> Result<f64, FormatError> {
    value
        .as_f64()
        .ok_or_else(|| FormatError::new(format!("\"{value}\" is not a number")))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn currency(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${}.{frac}", group_thousands(int))
}

fn currency_cell(value: &Value, _: &Record, _: usize) -> Result<CellContent, FormatError> {
    Ok(CellContent::Text(currency(number(value)?)))
}

fn percent_cell(value: &Value, _: &Record, _: usize) -> Result<CellContent, FormatError> {
    Ok(CellContent::Text(format!("{:.1}%", number(value)? * 100.0)))
}

fn upper_cell(value: &Value, _: &Record, _: usize) -> Result<CellContent, FormatError> {
    Ok(CellContent::Text(value.to_string().to_uppercase()))
}

fn lower_cell(value: &Value, _: &Record, _: usize) -> Result<CellContent, FormatError> {
    Ok(CellContent::Text(value.to_string().to_lowercase()))
}

fn bold_cell(value: &Value, _: &Record, _: usize) -> Result<CellContent, FormatError> {
    Ok(CellContent::Markup(format!("<b>{value}</b>")))
}

fn date_cell(value: &Value, _: &Record, _: usize) -> Result<CellContent, FormatError> {
    parse_date(&value.to_string())
        .map(|d| CellContent::Text(d.format("%Y-%m-%d").to_string()))
        .ok_or_else(|| FormatError::new(format!("\"{value}\" is not a date")))
}

/// Formatters selectable by name on the command line.
pub fn builtin(name: &str) -> Result<Formatter, TVError> {
    let formatter: Formatter = match name {
        "currency" => Box::new(currency_cell),
        "percent" => Box::new(percent_cell),
        "upper" => Box::new(upper_cell),
        "lower" => Box::new(lower_cell),
        "bold" => Box::new(bold_cell),
        "date" => Box::new(date_cell),
        other => return Err(TVError::InvalidArgument(format!("unknown formatter \"{other}\""))),
    };
    Ok(formatter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, "$0.00")]
    #[case(5.0, "$5.00")]
    #[case(1234.5, "$1,234.50")]
    #[case(1234567.891, "$1,234,567.89")]
    #[case(-999.999, "-$1,000.00")]
    fn currency_format(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(currency(value), expected);
    }

    #[test]
    fn builtin_formatters() {
        let record = Record::default();
        let fmt = builtin("currency").unwrap();
        assert_eq!(
            fmt(&Value::Int(1500), &record, 0).unwrap(),
            CellContent::text("$1,500.00")
        );
        assert!(fmt(&Value::from("abc"), &record, 0).is_err());

        let fmt = builtin("percent").unwrap();
        assert_eq!(
            fmt(&Value::Float(0.25), &record, 0).unwrap(),
            CellContent::text("25.0%")
        );

        let fmt = builtin("bold").unwrap();
        assert_eq!(
            fmt(&Value::from("x"), &record, 0).unwrap(),
            CellContent::markup("<b>x</b>")
        );

        let fmt = builtin("date").unwrap();
        assert_eq!(
            fmt(&Value::from("Jan 9, 2021"), &record, 0).unwrap(),
            CellContent::text("2021-01-09")
        );

        assert!(matches!(builtin("nope"), Err(TVError::InvalidArgument(_))));
    }

    #[test]
    fn options_from_command_line() {
        let config = TVConfig::parse_from([
            "dtv", "data.csv", "--columns", "b,a", "--header", "a=Alpha", "--format",
            "b=upper", "--raw", "b", "--export-name", "out.csv",
        ]);
        let options = TableOptions::from_config(&config).unwrap();
        assert_eq!(options.columns, vec!["b", "a"]);
        assert_eq!(options.headers.get("a").map(String::as_str), Some("Alpha"));
        assert!(options.formatters.contains_key("b"));
        assert!(options.raw_markup.contains("b"));
        assert_eq!(options.export_filename, "out.csv");
    }

    #[test]
    fn unknown_formatter_on_command_line() {
        let config = TVConfig::parse_from(["dtv", "data.csv", "--format", "a=fancy"]);
        assert!(TableOptions::from_config(&config).is_err());
    }
}
