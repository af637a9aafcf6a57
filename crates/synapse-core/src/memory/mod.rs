//! Memory Store (C4): interaction records and the retrieval pipeline.

mod interaction;
mod store;

pub use interaction::Interaction;
pub use store::{IngestionToken, MemoryStore, MemoryStoreError, RetrievedInteraction};
