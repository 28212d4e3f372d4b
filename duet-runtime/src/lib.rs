pub mod receipt_store;
pub mod runtime;

// Re-export the main types for convenience
pub use receipt_store::{
    InMemoryReceiptIterator, InMemoryReceiptStore, ReceiptIterator, ReceiptStore,
};
pub use runtime::{LedgerRuntime, Query, QueryResult};
