// Implementations of the moderation store traits.

pub mod sqlite_account_store;
pub mod sqlite_script_store;

// Re-export for convenience
pub use sqlite_account_store::SqliteAccountStore;
pub use sqlite_script_store::SqliteScriptStore;
