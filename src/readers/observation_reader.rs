use crate::error::{ProcessingError, Result};
use crate::models::ObservationRecord;
use crate::utils::constants::{
    DATE_FORMAT, DEFAULT_BUFFER_SIZE, FIELDS_PER_ROW, FIELD_DELIMITER, MISSING_VALUE_SENTINEL,
    SOURCE_VALUE_DIVISOR,
};
use chrono::NaiveDate;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, warn};

/// A row the parser refused, kept for the run report.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

/// Everything read from one station file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub station_id: String,
    pub records: Vec<ObservationRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl ParsedFile {
    pub fn rows_read(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

/// Reader for tab-separated daily observation files
/// (`YYYYMMDD  max  min  precip`, values in tenths, `-9999` for missing).
pub struct ObservationReader {
    use_mmap: bool,
}

impl ObservationReader {
    pub fn new() -> Self {
        Self { use_mmap: false }
    }

    pub fn with_mmap(use_mmap: bool) -> Self {
        Self { use_mmap }
    }

    /// Station id is the file name up to the first `.` (e.g. USC00110072.txt -> USC00110072)
    pub fn station_id_from_path(path: &Path) -> Result<String> {
        let filename = path
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid file path: {:?}", path)))?;

        match filename.split('.').next() {
            Some(stem) if !stem.is_empty() => Ok(stem.to_string()),
            _ => Err(ProcessingError::InvalidFormat(format!(
                "Could not derive station ID from filename: {}",
                filename
            ))),
        }
    }

    /// Read a whole file. Malformed rows are collected in `rejected`, never returned as errors.
    pub fn read_file(&self, path: &Path) -> Result<ParsedFile> {
        if self.use_mmap {
            self.read_file_mmap(path)
        } else {
            self.read_file_buffered(path)
        }
    }

    /// Stream records lazily. Each call starts again from the top of the file.
    pub fn stream(&self, path: &Path) -> Result<ObservationIterator> {
        ObservationIterator::new(path)
    }

    fn read_file_buffered(&self, path: &Path) -> Result<ParsedFile> {
        let mut parsed = ParsedFile {
            station_id: Self::station_id_from_path(path)?,
            records: Vec::new(),
            rejected: Vec::new(),
        };

        for item in self.stream(path)? {
            match item {
                Ok(record) => parsed.records.push(record),
                Err(ProcessingError::MalformedRecord { line, message }) => {
                    parsed.rejected.push(RejectedRow {
                        line,
                        reason: message,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(parsed)
    }

    fn read_file_mmap(&self, path: &Path) -> Result<ParsedFile> {
        let station_id = Self::station_id_from_path(path)?;
        let file = open_source(path)?;

        let mut parsed = ParsedFile {
            station_id,
            records: Vec::new(),
            rejected: Vec::new(),
        };

        // Mapping an empty file fails on some platforms
        if file.metadata()?.len() == 0 {
            return Ok(parsed);
        }

        let mmap = unsafe { Mmap::map(&file)? };
        let (content, _, had_errors) = encoding_rs::UTF_8.decode(&mmap);
        if had_errors {
            warn!(path = %path.display(), "File contains invalid UTF-8, replaced with U+FFFD");
        }

        for (index, line) in content.lines().enumerate() {
            let line_number = index as u64 + 1;
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split(FIELD_DELIMITER as char).map(str::trim).collect();
            match Self::parse_row(&fields, &parsed.station_id, line_number) {
                Ok(record) => parsed.records.push(record),
                Err(ProcessingError::MalformedRecord { line, message }) => {
                    parsed.rejected.push(RejectedRow {
                        line,
                        reason: message,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(parsed)
    }

    /// Parse one row's fields into a record. Only the date and the field count
    /// can make a row malformed; unreadable measurements become missing values.
    pub fn parse_row(fields: &[&str], station_id: &str, line: u64) -> Result<ObservationRecord> {
        if fields.len() != FIELDS_PER_ROW {
            return Err(ProcessingError::malformed(
                line,
                format!("expected {} fields, found {}", FIELDS_PER_ROW, fields.len()),
            ));
        }

        let date = parse_date(fields[0], line)?;

        Ok(ObservationRecord::new(
            station_id,
            date,
            parse_measurement(fields[1], line),
            parse_measurement(fields[2], line),
            parse_measurement(fields[3], line),
        ))
    }
}

impl Default for ObservationReader {
    fn default() -> Self {
        Self::new()
    }
}

fn open_source(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ProcessingError::FileNotFound(path.to_path_buf()),
        _ => ProcessingError::Io(e),
    })
}

/// Strict `YYYYMMDD`: exactly eight ASCII digits forming a real calendar date.
fn parse_date(raw: &str, line: u64) -> Result<NaiveDate> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProcessingError::malformed(
            line,
            format!("invalid date '{}', expected YYYYMMDD", raw),
        ));
    }

    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| ProcessingError::malformed(line, format!("invalid date '{}': {}", raw, e)))
}

/// Same replacement decoding as the memory-mapped path, so both read paths
/// see identical text.
fn decode_field(raw: &[u8], line: u64) -> Cow<'_, str> {
    let (text, had_errors) = encoding_rs::UTF_8.decode_without_bom_handling(raw);
    if had_errors {
        debug!(line, "Invalid UTF-8 in field replaced with U+FFFD");
    }
    text
}

/// Tenths to physical units; the sentinel and anything non-numeric map to `None`.
fn parse_measurement(raw: &str, line: u64) -> Option<f64> {
    match raw.parse::<f64>() {
        Ok(value) if value == MISSING_VALUE_SENTINEL => None,
        Ok(value) if value.is_finite() => Some(value / SOURCE_VALUE_DIVISOR),
        _ => {
            debug!(line, value = raw, "Non-numeric measurement treated as missing");
            None
        }
    }
}

/// Lazy iterator over one station file. Row-level problems surface as
/// `MalformedRecord` items; I/O failures as any other error.
///
/// Rows are read as raw bytes and decoded field by field, so invalid UTF-8
/// in a measurement only blanks that value.
pub struct ObservationIterator {
    records: csv::ByteRecordsIntoIter<BufReader<File>>,
    station_id: String,
}

impl ObservationIterator {
    fn new(path: &Path) -> Result<Self> {
        let station_id = ObservationReader::station_id_from_path(path)?;
        let file = open_source(path)?;
        let reader = csv::ReaderBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(csv::Trim::All)
            .from_reader(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file));

        Ok(Self {
            records: reader.into_byte_records(),
            station_id,
        })
    }
}

impl Iterator for ObservationIterator {
    type Item = Result<ObservationRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Some(Err(e.into())),
                Err(e) => {
                    let line = e.position().map_or(0, |p| p.line());
                    return Some(Err(ProcessingError::malformed(line, e.to_string())));
                }
            };

            if record.iter().all(|field| field.is_empty()) {
                continue;
            }

            let line = record.position().map_or(0, |p| p.line());
            let decoded: Vec<Cow<'_, str>> =
                record.iter().map(|field| decode_field(field, line)).collect();
            let fields: Vec<&str> = decoded.iter().map(AsRef::as_ref).collect();
            return Some(ObservationReader::parse_row(&fields, &self.station_id, line));
        }
    }
}
