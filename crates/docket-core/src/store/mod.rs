pub mod document;
pub mod ledger;
pub mod ledger_store;

pub use document::{DocumentLock, DocumentStore, FileStore, MemoryStore, StoreError};
pub use ledger::Ledger;
pub use ledger_store::LedgerStore;
