// Data preparation: CSV loading and record normalization

pub mod csv_source;
pub mod normalize;

pub use csv_source::CsvSource;
pub use normalize::{CleaningRules, RecordNormalizer};
