mod collection;
mod counter;
mod errors;
mod store;

pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_counters_exist, Counter, COUNTER_IDS};
pub use errors::is_duplicate_key_error;
pub use store::MongoStore;

/// Connect to the database server used by tests, named by `EVOTE_TEST_DB_URI`.
#[cfg(test)]
pub async fn test_client() -> mongodb::Client {
    let uri = std::env::var("EVOTE_TEST_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
    mongodb::Client::with_uri_str(&uri)
        .await
        .expect("Failed to connect to the test database server")
}

/// A database name no other running test is using.
#[cfg(test)]
pub fn test_database_name() -> String {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);
    format!(
        "evote_test_{}_{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}
