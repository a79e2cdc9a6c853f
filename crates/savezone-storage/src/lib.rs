pub mod gdrive;
pub mod http;
pub mod local;
pub mod mock;
pub mod provider;
pub mod registry;
pub mod yadisk;

pub use provider::StorageProvider;
pub use registry::{AuthStrategy, StorageEntry, StorageKind, StorageRegistry};
