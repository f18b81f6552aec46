/// Products are keyed by a random (v4) UUID.
pub type ProductId = uuid::Uuid;

/// All timestamps are naive and interpreted as UTC.
pub type Timestamp = chrono::NaiveDateTime;
