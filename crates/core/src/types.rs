/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identity of a worker slot in the pool (`worker-1` .. `worker-N`).
pub type WorkerId = String;
