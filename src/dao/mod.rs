/// Persisted record shapes shared by every store.
pub mod models;
/// Store abstraction and its backends.
pub mod session_store;
/// Storage error taxonomy.
pub mod storage;
