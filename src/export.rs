use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dataset::{Dataset, Record};
use crate::domain::TVError;

pub const CSV_MIME: &str = "text/csv";

/// Saves an in-memory file the way a browser download would.
pub trait Downloader {
    fn download(&mut self, filename: &str, mime: &str, contents: &str) -> Result<PathBuf, TVError>;
}

/// Writes downloads into a directory.
#[derive(Debug, Clone)]
pub struct FileDownloader {
    dir: PathBuf,
}

impl FileDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Downloader for FileDownloader {
    fn download(&mut self, filename: &str, mime: &str, contents: &str) -> Result<PathBuf, TVError> {
        let name = Path::new(filename)
            .file_name()
            .and_then(|s| s.to_str())
            .filter(|s| *s == filename)
            .ok_or_else(|| TVError::InvalidArgument(format!("\"{filename}\" is not a file name")))?;

        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(name);
        let partial = self.dir.join(format!(".{name}.part"));
        debug!("Writing {} bytes of {mime} to {:?}", contents.len(), partial);

        // The partial file never outlives this call.
        if let Err(e) = fs::write(&partial, contents).and_then(|_| fs::rename(&partial, &target)) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }

        info!("Downloaded {:?}", target);
        Ok(target)
    }
}

fn csv_writer(quote_style: QuoteStyle) -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .quote_style(quote_style)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

/// Text written so far, without the last line terminator.
fn finish(writer: Writer<Vec<u8>>) -> Result<String, TVError> {
    let bytes = writer.into_inner().map_err(|e| TVError::IoError(e.into_error()))?;
    let mut text = String::from_utf8(bytes).map_err(|e| TVError::InvalidArgument(e.to_string()))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

fn write_record(writer: &mut Writer<Vec<u8>>, record: &Record, columns: &[String]) -> Result<(), TVError> {
    writer.write_record(columns.iter().map(|key| record.text(key)))?;
    Ok(())
}

/// One record with every value quoted.
pub fn record_line(record: &Record, columns: &[String]) -> Result<String, TVError> {
    let mut writer = csv_writer(QuoteStyle::Always);
    write_record(&mut writer, record, columns)?;
    finish(writer)
}

/// The whole dataset in schema order, independent of any view state.
/// Header fields are quoted only where needed, values always.
pub fn to_csv(dataset: &Dataset) -> Result<String, TVError> {
    let columns = dataset.schema();
    let mut header = csv_writer(QuoteStyle::Necessary);
    header.write_record(columns)?;

    let mut body = csv_writer(QuoteStyle::Always);
    for record in dataset.records() {
        write_record(&mut body, record, columns)?;
    }

    let header = finish(header)?;
    let body = finish(body)?;
    debug!("Serialized {} records", dataset.len());
    if dataset.is_empty() {
        Ok(header)
    } else {
        Ok(format!("{header}\n{body}"))
    }
}
