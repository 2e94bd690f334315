use polars::prelude::*;
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::TVError;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// A single cell value of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => crate::sort::parse_number(s),
            Value::Null | Value::Bool(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Ordered mapping of column key to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Stringified value of a column, empty for a missing key.
    pub fn text(&self, key: &str) -> String {
        self.get(key).map(|v| v.to_string()).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::default();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Records sharing an explicit column schema. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    name: String,
    schema: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Every record has to carry a value for every schema key.
    pub fn new(schema: Vec<String>, records: Vec<Record>) -> Result<Self, TVError> {
        for (row, record) in records.iter().enumerate() {
            if let Some(column) = schema.iter().find(|key| record.get(key).is_none()) {
                return Err(TVError::SchemaMismatch {
                    row,
                    column: column.clone(),
                });
            }
        }
        Ok(Dataset {
            name: String::new(),
            schema,
            records,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn load(path: PathBuf) -> Result<Self, TVError> {
        let file_info = get_file_info(path)?;
        debug!("Loading {:?} ({} bytes)", file_info.path, file_info.file_size);
        let frame = match file_info.file_type {
            FileType::CSV => load_csv(&file_info.path)?,
            FileType::PARQUET => load_parquet(&file_info.path)?,
            FileType::ARROW => load_arrow(&file_info.path)?,
        };

        // Each column is converted in its own rayon task, records are assembled afterwards.
        let start_time = Instant::now();
        let df = Arc::new(frame.collect()?);
        let columns: Result<Vec<(String, Vec<Value>)>, PolarsError> = df
            .get_column_names()
            .par_iter()
            .map(|name| load_column(&df, name))
            .collect();
        let columns = columns?;

        let schema: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let records: Vec<Record> = (0..df.height())
            .map(|row| {
                columns
                    .iter()
                    .map(|(name, values)| (name.clone(), values[row].clone()))
                    .collect()
            })
            .collect();

        info!(
            "Loading {} records with {} columns took {}ms ...",
            records.len(),
            schema.len(),
            start_time.elapsed().as_millis()
        );

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        Ok(Dataset::new(schema, records)?.with_name(name))
    }
}

fn is_integer_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn is_float_type(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<Value>), PolarsError> {
    let column = df.column(col_name)?;
    let dtype = column.dtype().clone();

    let values: Vec<Value> = if is_integer_type(&dtype) {
        let col = column.cast(&DataType::Int64)?;
        col.i64()?.into_iter().map(Value::from).collect()
    } else if is_float_type(&dtype) {
        let col = column.cast(&DataType::Float64)?;
        col.f64()?.into_iter().map(Value::from).collect()
    } else if dtype == DataType::Boolean {
        column.bool()?.into_iter().map(Value::from).collect()
    } else {
        let col = column.cast(&DataType::String)?;
        col.str()?.into_iter().map(Value::from).collect()
    };

    debug!("Column \"{col_name}\", {dtype:?}, # rows {}", values.len());
    Ok((col_name.to_string(), values))
}

fn detect_file_type(path: &Path) -> Result<FileType, TVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(TVError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, TVError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TVError::FileNotFound,
        ErrorKind::PermissionDenied => TVError::PermissionDenied,
        _ => TVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TVError::LoadingFailed("Not a file!".into()));
    }

    Ok(FileInfo {
        file_size: metadata.len(),
        file_type: detect_file_type(&path)?,
        path,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}
