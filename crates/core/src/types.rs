/// UTC timestamp used on all persisted records.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
