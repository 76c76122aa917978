pub mod error;
pub mod json_file;
pub mod memory;
pub mod state;
pub mod store;

pub use error::StoreError;
pub use json_file::JsonFileStore;
pub use memory::InMemoryStateStore;
pub use state::{DiskManagerState, Operation, Statistics};
pub use store::StateStore;
