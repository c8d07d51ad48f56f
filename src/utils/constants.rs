/// Placeholder used in source files for a missing measurement
pub const MISSING_VALUE_SENTINEL: f64 = -9999.0;

/// Source values are recorded in tenths of their physical unit
pub const SOURCE_VALUE_DIVISOR: f64 = 10.0;

/// Source file layout
pub const FIELD_DELIMITER: u8 = b'\t';
pub const FIELDS_PER_ROW: usize = 4;
pub const DATE_FORMAT: &str = "%Y%m%d";
pub const DEFAULT_SOURCE_EXTENSION: &str = "txt";
pub const DEFAULT_SOURCE_DIR: &str = "wx_data";

/// Processing defaults
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Pagination defaults
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 10;
