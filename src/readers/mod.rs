pub mod directory;
pub mod observation_reader;

pub use directory::find_source_files;
pub use observation_reader::{ObservationIterator, ObservationReader, ParsedFile, RejectedRow};
