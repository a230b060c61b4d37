use serde::{Deserialize, Serialize};

use crate::template::OptionKind;

/// Input for adding an option. Which field is required depends on `kind`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewOption {
    pub label: String,
    pub kind: OptionKind,
    pub sub_template_id: String,
}

impl NewOption {
    pub fn text(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: OptionKind::Text,
            sub_template_id: String::new(),
        }
    }

    /// The label is taken from the target template's name when added.
    pub fn sub_template(target: impl Into<String>) -> Self {
        Self {
            label: String::new(),
            kind: OptionKind::SubTemplate,
            sub_template_id: target.into(),
        }
    }
}
