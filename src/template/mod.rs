//! Template / option data model and its persisted form.

pub mod id;
pub mod patch;
pub mod schema;
pub mod types;

pub use id::{generate_id, IdKind};
pub use patch::OptionPatch;
pub use types::{OptionKind, Template, WheelOption};
