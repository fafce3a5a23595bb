//! # EZPass Core
//!
//! Page-side logic of the autofill client, written against the host traits
//! in `ezpass-protocols`:
//!
//! - [`normalize`] / [`effective_origin`] - page address to origin key
//! - [`synthesize`] - locator for an input element
//! - [`MappingStore`] - per-origin role assignments over a key-value store
//! - [`FieldMapper`] - the drop handler that creates assignments
//! - [`FillEngine`] - fetch and fill, with account disambiguation
//! - [`SaveFlow`] - confirm and store typed credentials
//! - [`NavigationMonitor`] - when a page change needs a fetch
//! - [`CommandRouter`] - cross-context command dispatch
//!
//! Host adapters for tests and the CLI: [`MemoryKeyValueStore`],
//! [`FileKeyValueStore`] and [`SnapshotDocument`].

mod assign;
mod fill;
mod mapping;
mod navigation;
mod origin;
mod router;
mod save;
mod selector;
mod snapshot;
mod storage;

#[cfg(test)]
mod testing;

pub use assign::{AssignOutcome, FieldMapper};
pub use fill::{
    FieldFill, FillEngine, FillOutcome, FillReport, PASSWORD_PLACEHOLDER, Placeholders,
    USERNAME_PLACEHOLDER,
};
pub use mapping::{MAPPINGS_KEY, MappedFields, MappingStore};
pub use navigation::{NavigationEvent, NavigationMonitor};
pub use origin::{effective_origin, normalize};
pub use router::CommandRouter;
pub use save::{
    MISSING_VALUES_MESSAGE, ORIGIN_MISMATCH_MESSAGE, SAVE_FAILED_MESSAGE, SaveFlow, SaveOutcome,
    SavePrompt,
};
pub use selector::{nearest_input, synthesize};
pub use snapshot::{PageSnapshot, SnapshotDocument, SnapshotNode};
pub use storage::{FileKeyValueStore, MemoryKeyValueStore};
