pub mod adapter;
pub mod config;
pub mod error;
pub mod metadata;
mod overflow;
pub mod registry;
mod resolve;
mod scratch;

pub use adapter::Adapter;
pub use config::{AdapterOptions, OverwritePolicy};
pub use error::{AdaptError, ConfigError, ErrorKind};
pub use metadata::{MemberDescriptor, MetadataCache, TypeMetadata};
pub use registry::{Registries, RegistryBatch, Scope};
