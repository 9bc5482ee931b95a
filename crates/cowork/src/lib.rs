//! Resource registry for an agent-driven workspace.
//!
//! Local files and directories are registered as queryable resources:
//! scanned, classified, indexed, and watched for changes by the
//! `filesystem` crate, while this crate owns the resource collection,
//! its persistence, debounced change notification, and the HTTP surface.

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod resource;
pub mod server;
pub mod store;

pub use config::CoworkConfig;
pub use error::{CoreError, CoreResult};
pub use events::ChangeNotifier;
pub use registry::ResourceRegistry;
pub use resource::{Resource, ResourceKind};
pub use store::file::FileResourceStore;
pub use store::memory::MemoryResourceStore;
pub use store::{ResourceStore, SharedStore};
