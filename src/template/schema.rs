//! Persisted layout of the template collection.
//!
//! Current form is `{"version": 1, "templates": [...]}`. Version 0 is the
//! bare array written by older builds. Decoding never fails: anything it
//! cannot make sense of becomes an empty collection.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::id::IdKind;
use super::types::{OptionKind, Template};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    templates: &'a [Template],
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    templates: Vec<Template>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBlob {
    Versioned(Envelope),
    Legacy(Vec<Template>),
}

pub fn encode(templates: &[Template]) -> serde_json::Result<String> {
    serde_json::to_string(&EnvelopeRef {
        version: SCHEMA_VERSION,
        templates,
    })
}

pub fn decode(raw: &str) -> Vec<Template> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let templates = match serde_json::from_str::<StoredBlob>(raw) {
        Ok(StoredBlob::Legacy(templates)) => templates,
        Ok(StoredBlob::Versioned(envelope)) if envelope.version <= SCHEMA_VERSION => {
            envelope.templates
        }
        Ok(StoredBlob::Versioned(envelope)) => {
            warn!(
                version = envelope.version,
                "Template blob written by a newer schema, starting empty"
            );
            return Vec::new();
        }
        Err(e) => {
            warn!("Template blob is unreadable, starting empty: {}", e);
            return Vec::new();
        }
    };

    templates
        .into_iter()
        .enumerate()
        .map(|(i, t)| normalize(i, t))
        .collect()
}

/// Id for a record stored without one. Derived from its position so that
/// every read of the same blob agrees; the next write persists it.
pub fn restored_id(kind: IdKind, owner: &str, index: usize) -> String {
    if owner.is_empty() {
        format!("{}_restored_{}", kind.prefix(), index)
    } else {
        format!("{}_restored_{}_{}", kind.prefix(), owner, index)
    }
}

/// Fills the gaps a hand-edited or old record may have.
fn normalize(index: usize, mut template: Template) -> Template {
    if template.id.is_empty() {
        template.id = restored_id(IdKind::Template, "", index);
    }

    for (i, option) in template.options.iter_mut().enumerate() {
        if option.id.is_empty() {
            option.id = restored_id(IdKind::Option, &template.id, i);
        }
        if option.kind == OptionKind::Text {
            option.sub_template_id.clear();
        }
    }

    let mut seen = Vec::with_capacity(template.hidden_option_ids.len());
    for id in template.hidden_option_ids.drain(..) {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    template.hidden_option_ids = seen;

    template
}
