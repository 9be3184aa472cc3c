/// Opaque job identifier. Generated as a UUID v4 string unless the caller
/// supplies one.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
