//! Owner of the persisted template collection.
//!
//! Every mutation reads the whole collection, transforms it in memory and
//! writes the whole collection back while holding the write gate, so two
//! calls issued back-to-back cannot overwrite each other's effect. Reads
//! never fail: missing or corrupt state comes back as defaults.

pub mod error;
pub mod request;

pub use error::{Result, StoreError, ValidationError};
pub use request::NewOption;

use futures::future;
use rand_core::RngCore;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::StoreConfig;
use crate::storage::{KeyValueStore, StorageError, StorageKeys};
use crate::template::{
    generate_id, schema, IdKind, OptionKind, OptionPatch, Template, WheelOption,
};
use crate::wheel::{self, DrawOutcome};

pub struct TemplateStore<S> {
    backend: S,
    keys: StorageKeys,
    config: StoreConfig,
    /// Serializes read-modify-write cycles.
    gate: Mutex<()>,
}

impl<S: KeyValueStore> TemplateStore<S> {
    pub fn new(backend: S) -> Self {
        let config = StoreConfig::default();
        Self {
            keys: config.storage_keys(),
            backend,
            config,
            gate: Mutex::new(()),
        }
    }

    pub fn with_config(backend: S, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            keys: config.storage_keys(),
            backend,
            config,
            gate: Mutex::new(()),
        })
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /* ---------- reads ---------- */

    /// Persisted templates in order; empty when absent or unreadable.
    #[instrument(skip(self))]
    pub async fn list_templates(&self) -> Vec<Template> {
        match self.backend.get_item(&self.keys.templates).await {
            Ok(Some(raw)) => schema::decode(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(
                    backend = self.backend.name(),
                    "Reading templates failed, treating as empty: {}", e
                );
                Vec::new()
            }
        }
    }

    /// Raw pointer, possibly stale. Empty when never set.
    pub async fn current_template_id(&self) -> String {
        self.read_string(&self.keys.current_template_id).await
    }

    pub async fn hide_picked_enabled(&self) -> bool {
        self.read_flag(&self.keys.hide_picked_enabled).await
    }

    /// Template the wheel should show. Seeds the store first, then falls
    /// back to the first template when the pointer is stale or empty.
    #[instrument(skip(self))]
    pub async fn current_template(&self) -> Result<Option<Template>> {
        self.ensure_initial_template().await?;
        let (templates, current_id) =
            future::join(self.list_templates(), self.current_template_id()).await;
        Ok(resolve_current(templates, &current_id))
    }

    /* ---------- templates ---------- */

    /// Replaces the whole collection.
    pub async fn save_all_templates(&self, templates: &[Template]) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.write_templates(templates).await
    }

    /// Seeds one default template when the store is empty. No-op otherwise.
    #[instrument(skip(self))]
    pub async fn ensure_initial_template(&self) -> Result<Vec<Template>> {
        let _gate = self.gate.lock().await;

        let templates = self.list_templates().await;
        if !templates.is_empty() {
            return Ok(templates);
        }

        let mut seed = Template::new(
            generate_id(IdKind::Template),
            self.config.default_template_name.clone(),
        );
        seed.options = self
            .config
            .seed_option_labels()
            .into_iter()
            .map(|label| WheelOption::text(generate_id(IdKind::Option), label))
            .collect();

        let templates = vec![seed];
        self.write_templates(&templates).await?;
        self.write_string(&self.keys.current_template_id, &templates[0].id)
            .await?;

        info!(template_id = %templates[0].id, "Seeded default template");
        Ok(templates)
    }

    /// Appends an empty template and makes it current.
    #[instrument(skip(self))]
    pub async fn create_template(&self, name: &str) -> Result<Template> {
        let _gate = self.gate.lock().await;

        let name = if name.is_empty() {
            self.config.new_template_name.clone()
        } else {
            name.to_string()
        };
        let template = Template::new(generate_id(IdKind::Template), name);

        let mut templates = self.list_templates().await;
        templates.push(template.clone());
        self.write_templates(&templates).await?;
        self.write_string(&self.keys.current_template_id, &template.id)
            .await?;

        info!(template_id = %template.id, "Template created");
        Ok(template)
    }

    /// Removes a template and every option elsewhere that links to it.
    /// A deleted current template hands over to the first survivor.
    #[instrument(skip(self))]
    pub async fn delete_template(&self, template_id: &str) -> Result<()> {
        let _gate = self.gate.lock().await;

        let mut templates = self.list_templates().await;
        let before = templates.len();
        templates.retain(|t| t.id != template_id);
        let pruned: usize = templates
            .iter_mut()
            .map(|t| t.prune_references(template_id))
            .sum();
        self.write_templates(&templates).await?;

        if self.current_template_id().await == template_id {
            let next = templates.first().map(|t| t.id.as_str()).unwrap_or("");
            self.write_string(&self.keys.current_template_id, next)
                .await?;
        }

        info!(
            removed = before - templates.len(),
            pruned, "Template deleted"
        );
        Ok(())
    }

    /// Renames a template and relabels every option linking to it.
    #[instrument(skip(self))]
    pub async fn rename_template(&self, template_id: &str, name: &str) -> Result<()> {
        let relabeled = self
            .mutate(|templates| Ok(apply_rename(templates, template_id, name)))
            .await?;
        info!(relabeled, "Template renamed");
        Ok(())
    }

    /// Points the wheel at `template_id`. Not checked against the collection.
    pub async fn set_current_template_id(&self, template_id: &str) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.write_string(&self.keys.current_template_id, template_id)
            .await
    }

    /// Template picked from the editor: switch and ask the wheel screen to
    /// drop the result it is still showing.
    pub async fn select_template(&self, template_id: &str) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.write_string(&self.keys.current_template_id, template_id)
            .await?;
        self.write_flag(&self.keys.clear_result_flag, true).await
    }

    /* ---------- options ---------- */

    /// Appends an enabled option. A sub-template option is labeled with its
    /// target's current name. `Ok(None)` when `template_id` is unknown.
    #[instrument(skip(self))]
    pub async fn add_option(
        &self,
        template_id: &str,
        new: NewOption,
    ) -> Result<Option<WheelOption>> {
        self.mutate(|templates| {
            let option = match new.kind {
                OptionKind::Text => {
                    let label = new.label.trim();
                    if label.is_empty() {
                        return Err(ValidationError::MissingLabel.into());
                    }
                    WheelOption::text(generate_id(IdKind::Option), label)
                }
                OptionKind::SubTemplate => {
                    let target_id = new.sub_template_id.trim();
                    if target_id.is_empty() {
                        return Err(ValidationError::MissingSubTemplate.into());
                    }
                    let target = templates
                        .iter()
                        .find(|t| t.id == target_id)
                        .ok_or_else(|| ValidationError::SubTemplateNotFound(target_id.to_string()))?;
                    WheelOption::sub_template(
                        generate_id(IdKind::Option),
                        target.name.clone(),
                        target_id,
                    )
                }
            };

            let Some(template) = templates.iter_mut().find(|t| t.id == template_id) else {
                return Ok(None);
            };
            template.options.push(option.clone());
            debug!(option_id = %option.id, kind = option.kind.as_str(), "Option added");
            Ok(Some(option))
        })
        .await
    }

    /// Merges `patch` into an option. A new label on a sub-template option
    /// also renames the linked template, which in turn relabels every other
    /// option pointing at it. Returns false when the option is unknown.
    #[instrument(skip(self))]
    pub async fn update_option(
        &self,
        template_id: &str,
        option_id: &str,
        patch: OptionPatch,
    ) -> Result<bool> {
        self.mutate(|templates| {
            let Some(option) = templates
                .iter_mut()
                .find(|t| t.id == template_id)
                .and_then(|t| t.option_mut(option_id))
            else {
                return Ok(false);
            };
            option.apply(&patch);

            let rename = match (option.target(), patch.renaming_label()) {
                (Some(target), Some(label)) => Some((target.to_string(), label.to_string())),
                _ => None,
            };
            if let Some((target, label)) = rename {
                let relabeled = apply_rename(templates, &target, &label);
                debug!(target_id = %target, relabeled, "Linked template renamed");
            }
            Ok(true)
        })
        .await
    }

    pub async fn toggle_option_enabled(
        &self,
        template_id: &str,
        option_id: &str,
        enabled: bool,
    ) -> Result<bool> {
        self.update_option(template_id, option_id, OptionPatch::new().enabled(enabled))
            .await
    }

    /// Removes an option and its hidden entry. Other templates are untouched.
    #[instrument(skip(self))]
    pub async fn delete_option(&self, template_id: &str, option_id: &str) -> Result<bool> {
        self.mutate(|templates| {
            Ok(templates
                .iter_mut()
                .find(|t| t.id == template_id)
                .and_then(|t| t.remove_option(option_id))
                .is_some())
        })
        .await
    }

    /// Moves an option within its template; `to_index` is clamped.
    pub async fn reorder_option(
        &self,
        template_id: &str,
        option_id: &str,
        to_index: usize,
    ) -> Result<bool> {
        self.mutate(|templates| {
            Ok(templates
                .iter_mut()
                .find(|t| t.id == template_id)
                .map(|t| t.move_option(option_id, to_index))
                .unwrap_or(false))
        })
        .await
    }

    /* ---------- picked options ---------- */

    pub async fn set_hide_picked_enabled(&self, enabled: bool) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.write_flag(&self.keys.hide_picked_enabled, enabled).await
    }

    pub async fn set_hidden_option(
        &self,
        template_id: &str,
        option_id: &str,
        hidden: bool,
    ) -> Result<()> {
        self.mutate(|templates| {
            if let Some(t) = templates.iter_mut().find(|t| t.id == template_id) {
                if hidden {
                    t.hide(option_id);
                } else {
                    t.unhide(option_id);
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn clear_hidden_options(&self, template_id: &str) -> Result<()> {
        self.mutate(|templates| {
            if let Some(t) = templates.iter_mut().find(|t| t.id == template_id) {
                t.clear_hidden();
            }
            Ok(())
        })
        .await
    }

    /* ---------- wheel ---------- */

    /// Draws from the current template. With hide-picked on, the winner is
    /// recorded as picked in the same step. `Ok(None)` when nothing is
    /// eligible.
    #[instrument(skip(self, rng))]
    pub async fn spin<R>(&self, rng: &mut R) -> Result<Option<DrawOutcome>>
    where
        R: RngCore + Send + ?Sized,
    {
        self.ensure_initial_template().await?;
        let _gate = self.gate.lock().await;

        let hide_mode = self.hide_picked_enabled().await;
        let current_id = self.current_template_id().await;
        let mut templates = self.list_templates().await;

        let Some(pos) = templates
            .iter()
            .position(|t| t.id == current_id)
            .or_else(|| (!templates.is_empty()).then_some(0))
        else {
            return Ok(None);
        };

        let picked = {
            let eligible = wheel::eligible_options(&templates[pos], hide_mode);
            wheel::draw(&eligible, rng).cloned()
        };
        let Some(option) = picked else {
            debug!(template_id = %templates[pos].id, "Nothing eligible to draw");
            return Ok(None);
        };

        let pivot = wheel::resolve_pivot(&option, &templates);
        if hide_mode {
            templates[pos].hide(&option.id);
            self.write_templates(&templates).await?;
        }

        let template = &templates[pos];
        Ok(Some(DrawOutcome {
            template_id: template.id.clone(),
            remaining: wheel::eligible_options(template, hide_mode).len(),
            option,
            pivot,
            hidden: hide_mode,
        }))
    }

    /// Switches to the template a drawn sub-template option points at.
    /// False when there is nothing to follow or the target is gone.
    pub async fn follow_sub_template(&self, outcome: &DrawOutcome) -> Result<bool> {
        let Some(pivot) = &outcome.pivot else {
            return Ok(false);
        };
        let _gate = self.gate.lock().await;
        if !self.list_templates().await.iter().any(|t| t.id == pivot.id) {
            return Ok(false);
        }
        self.write_string(&self.keys.current_template_id, &pivot.id)
            .await?;
        Ok(true)
    }

    /* ---------- result flag ---------- */

    pub async fn set_clear_result_flag(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.write_flag(&self.keys.clear_result_flag, true).await
    }

    /// Reads the flag and resets it in one step.
    pub async fn take_clear_result_flag(&self) -> Result<bool> {
        let _gate = self.gate.lock().await;
        let set = self.read_flag(&self.keys.clear_result_flag).await;
        if set {
            self.write_flag(&self.keys.clear_result_flag, false).await?;
        }
        Ok(set)
    }

    /* ---------- plumbing ---------- */

    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Template>) -> Result<T> + Send,
        T: Send,
    {
        let _gate = self.gate.lock().await;
        let mut templates = self.list_templates().await;
        let out = f(&mut templates)?;
        self.write_templates(&templates).await?;
        Ok(out)
    }

    async fn write_templates(&self, templates: &[Template]) -> Result<()> {
        let raw = schema::encode(templates).map_err(StorageError::from)?;
        self.backend.set_item(&self.keys.templates, &raw).await?;
        Ok(())
    }

    async fn read_string(&self, key: &str) -> String {
        match self.backend.get_item(key).await {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                warn!(key, "Reading key failed, using default: {}", e);
                String::new()
            }
        }
    }

    async fn write_string(&self, key: &str, value: &str) -> Result<()> {
        self.backend.set_item(key, value).await?;
        Ok(())
    }

    async fn read_flag(&self, key: &str) -> bool {
        self.read_string(key).await == "true"
    }

    async fn write_flag(&self, key: &str, value: bool) -> Result<()> {
        self.write_string(key, if value { "true" } else { "false" })
            .await
    }
}

fn resolve_current(templates: Vec<Template>, current_id: &str) -> Option<Template> {
    let pos = templates
        .iter()
        .position(|t| t.id == current_id)
        .unwrap_or(0);
    templates.into_iter().nth(pos)
}

/// Sets the name and relabels linked options in every template,
/// including self-links. Returns the number of relabeled options.
fn apply_rename(templates: &mut [Template], template_id: &str, name: &str) -> usize {
    let mut relabeled = 0;
    for template in templates.iter_mut() {
        if template.id == template_id {
            template.name = name.to_string();
        }
        relabeled += template.relabel_references(template_id, name);
    }
    relabeled
}

#[cfg(test)]
mod tests;
