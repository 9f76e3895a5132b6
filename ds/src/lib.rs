//! DocStore - whole-document JSON persistence
//!
//! Stores JSON documents keyed by `(project, path, file)`, one file per
//! document. Every write replaces the whole document (last-writer-wins);
//! there are no partial updates and no query layer. Consumers that need
//! typed access implement the [`Record`] trait for their document types.
//!
//! # Architecture
//!
//! ```text
//! .docstore/
//! └── {project}/
//!     ├── .lock                 # advisory lock, serializes writes
//!     └── {path}/
//!         ├── tree.json
//!         ├── completions.json
//!         └── context.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docstore::Store;
//!
//! let store = Store::open(".docstore")?;
//! store.save("proj-1", "spanish", "tree.json", &doc)?;
//! let doc = store.load("proj-1", "spanish", "tree.json")?;
//! ```

pub mod cli;
pub mod config;
mod store;

use thiserror::Error;

pub use store::{ProjectStats, Record, Store, now_ms};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt document at {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
}
