use serde::{Deserialize, Deserializer, Serialize};

use super::patch::OptionPatch;

/// What an option does when it wins a draw.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// Plain label, nothing else happens.
    #[default]
    Text,
    /// Points at another template the wheel can pivot to.
    SubTemplate,
}

impl OptionKind {
    pub fn select_kind(kind: &str) -> Result<Self, String> {
        match kind {
            "text" => Ok(OptionKind::Text),
            "subtemplate" => Ok(OptionKind::SubTemplate),
            _ => Err(format!("Invalid option type selected: {}", kind)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKind::Text => "text",
            OptionKind::SubTemplate => "subtemplate",
        }
    }
}

/// One entry on a wheel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WheelOption {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: OptionKind,
    /// Target template id; empty unless `kind` is `SubTemplate`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_template_id: String,
    #[serde(default = "enabled_by_default", deserialize_with = "null_as_enabled")]
    pub enabled: bool,
}

impl WheelOption {
    pub fn text(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: OptionKind::Text,
            sub_template_id: String::new(),
            enabled: true,
        }
    }

    pub fn sub_template(
        id: impl Into<String>,
        label: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: OptionKind::SubTemplate,
            sub_template_id: target.into(),
            enabled: true,
        }
    }

    /// True when this option links to `template_id`.
    pub fn references(&self, template_id: &str) -> bool {
        self.kind == OptionKind::SubTemplate && self.sub_template_id == template_id
    }

    /// The linked template id, if this is a sub-template option with a target.
    pub fn target(&self) -> Option<&str> {
        match self.kind {
            OptionKind::SubTemplate if !self.sub_template_id.is_empty() => {
                Some(self.sub_template_id.as_str())
            }
            _ => None,
        }
    }

    pub fn apply(&mut self, patch: &OptionPatch) {
        if let Some(label) = &patch.label {
            self.label = label.clone();
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
    }
}

/// A named, ordered list of options plus the ids already picked from it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<WheelOption>,
    /// Ordered, never holds duplicates.
    #[serde(default, deserialize_with = "null_as_default")]
    pub hidden_option_ids: Vec<String>,
}

impl Template {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            options: Vec::new(),
            hidden_option_ids: Vec::new(),
        }
    }

    pub fn option(&self, option_id: &str) -> Option<&WheelOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn option_mut(&mut self, option_id: &str) -> Option<&mut WheelOption> {
        self.options.iter_mut().find(|o| o.id == option_id)
    }

    pub fn is_hidden(&self, option_id: &str) -> bool {
        self.hidden_option_ids.iter().any(|id| id == option_id)
    }

    /// Marks an option as picked. Adding an id twice is a no-op.
    pub fn hide(&mut self, option_id: &str) {
        if !self.is_hidden(option_id) {
            self.hidden_option_ids.push(option_id.to_string());
        }
    }

    pub fn unhide(&mut self, option_id: &str) {
        self.hidden_option_ids.retain(|id| id != option_id);
    }

    pub fn clear_hidden(&mut self) {
        self.hidden_option_ids.clear();
    }

    /// Removes an option together with its hidden-state entry.
    pub fn remove_option(&mut self, option_id: &str) -> Option<WheelOption> {
        let pos = self.options.iter().position(|o| o.id == option_id);
        self.unhide(option_id);
        pos.map(|i| self.options.remove(i))
    }

    /// Moves an option to `to_index`, clamped to the last slot.
    /// Returns false when the option is not in this template.
    pub fn move_option(&mut self, option_id: &str, to_index: usize) -> bool {
        let Some(from) = self.options.iter().position(|o| o.id == option_id) else {
            return false;
        };
        let option = self.options.remove(from);
        let to = to_index.min(self.options.len());
        self.options.insert(to, option);
        true
    }

    /// Drops every option linking to `template_id`. Returns how many went.
    pub fn prune_references(&mut self, template_id: &str) -> usize {
        let before = self.options.len();
        let removed: Vec<String> = self
            .options
            .iter()
            .filter(|o| o.references(template_id))
            .map(|o| o.id.clone())
            .collect();
        self.options.retain(|o| !o.references(template_id));
        for id in &removed {
            self.unhide(id);
        }
        before - self.options.len()
    }

    /// Rewrites the label of every option linking to `template_id`.
    pub fn relabel_references(&mut self, template_id: &str, name: &str) -> usize {
        let mut count = 0;
        for option in self.options.iter_mut().filter(|o| o.references(template_id)) {
            option.label = name.to_string();
            count += 1;
        }
        count
    }
}

fn enabled_by_default() -> bool {
    true
}

// Older blobs carry `null` where a field was never set.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_enabled<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}
