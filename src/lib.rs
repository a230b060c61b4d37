// Core of the decision wheel: templates, their options, and the draw.
// The UI shell binds to `commands` and renders what it gets back.

pub mod commands;
pub mod config;
pub mod storage;
pub mod store;
pub mod template;
pub mod wheel;

pub use config::{ConfigError, StoreConfig};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use store::{NewOption, StoreError, TemplateStore, ValidationError};
pub use template::{OptionKind, OptionPatch, Template, WheelOption};
pub use wheel::{draw, eligible_options, DrawOutcome, SubTemplateTarget};
