use serde::{Deserialize, Serialize};

/// Partial update merged into an existing option.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionPatch {
    pub label: Option<String>,
    pub enabled: Option<bool>,
}

impl OptionPatch {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Label that should also rename the linked template, if any.
    /// A blank label only edits the option itself.
    pub fn renaming_label(&self) -> Option<&str> {
        self.label.as_deref().filter(|l| !l.is_empty())
    }
}
