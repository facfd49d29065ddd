use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{EtlError, EtlResult};

// Source formats the reader understands
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FileType {
    Excel,
    LegacyExcel,
    Csv,
    Parquet,
}

impl FileType {
    /// DuckDB extensions that have to be installed and loaded before reading this type.
    pub fn required_extensions(self) -> &'static [&'static str] {
        match self {
            FileType::Excel => &["excel"],
            FileType::LegacyExcel => &["spatial"],
            FileType::Csv => &[],
            FileType::Parquet => &["parquet"],
        }
    }

    fn from_extension(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" => Some(FileType::Excel),
            "xls" => Some(FileType::LegacyExcel),
            "csv" => Some(FileType::Csv),
            "parquet" => Some(FileType::Parquet),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Excel => "Excel",
            FileType::LegacyExcel => "Excel 97-2003",
            FileType::Csv => "CSV",
            FileType::Parquet => "Parquet",
        };
        f.write_str(name)
    }
}

// Determine the file type based on the magic numbers, then the extension, then the content
pub fn determine_file_type(file_path: &Path) -> EtlResult<FileType> {
    let mut file = File::open(file_path).map_err(|e| EtlError::from_open(file_path, e))?;
    let mut header_buffer = [0u8; 16];
    let bytes_read = read_header(&mut file, &mut header_buffer)
        .map_err(|e| EtlError::unreadable(file_path, e))?;
    let header = &header_buffer[..bytes_read];

    if let Some(file_type) = match_magic_numbers(header, &mut file) {
        debug!(%file_type, "file type detected from magic number");
        return Ok(file_type);
    }

    if let Some(file_type) = FileType::from_extension(file_path) {
        debug!(%file_type, "file type taken from extension");
        return Ok(file_type);
    }

    let mut buffer = Vec::new();
    file.seek(io::SeekFrom::Start(0))
        .and_then(|_| file.read_to_end(&mut buffer))
        .map_err(|e| EtlError::unreadable(file_path, e))?;
    if is_valid_csv(&buffer) {
        return Ok(FileType::Csv);
    }

    Err(EtlError::unreadable(file_path, "unknown or unsupported file type"))
}

// `read` may return short counts, keep going until the buffer is full or EOF
fn read_header(file: &mut File, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn match_magic_numbers(header: &[u8], file: &mut File) -> Option<FileType> {
    match header {
        // PKZip signature, only a workbook if the archive carries an `xl/` part
        [0x50, 0x4B, 0x03, 0x04, ..] => {
            if is_workbook_archive(file) {
                Some(FileType::Excel)
            } else {
                warn!("zip archive without workbook parts");
                None
            }
        }
        // Compound File Binary Format (XLS)
        [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, ..] => Some(FileType::LegacyExcel),
        // Parquet
        [0x50, 0x41, 0x52, 0x31, ..] => Some(FileType::Parquet),
        _ => None,
    }
}

fn is_workbook_archive(file: &mut File) -> bool {
    if file.seek(io::SeekFrom::Start(0)).is_err() {
        return false;
    }
    match ZipArchive::new(&mut *file) {
        Ok(archive) => archive.file_names().any(|name| name.starts_with("xl/")),
        Err(e) => {
            debug!(error = %e, "zip signature present but archive unreadable");
            false
        }
    }
}

fn is_valid_csv(buffer: &[u8]) -> bool {
    let Ok(content) = std::str::from_utf8(buffer) else {
        return false;
    };
    let lines: Vec<&str> = content.lines().take(5).collect();

    if lines.len() < 2 {
        return false;
    }

    let first_line_fields = lines[0].split(',').count();
    // Require at least 2 columns and a consistent field count
    first_line_fields >= 2
        && lines[1..]
            .iter()
            .all(|line| line.split(',').count() == first_line_fields)
}

// Strip any extension and surrounding whitespace from a would-be table name
pub fn clean_table_name(table_name: &str) -> String {
    table_name
        .rsplit_once('.')
        .map(|(name, _)| name)
        .unwrap_or(table_name)
        .trim()
        .to_string()
}
