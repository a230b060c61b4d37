//! Command handlers the UI shell binds to.
//! Everything returns `Result<_, String>` so errors can be shown directly.

use crate::config::StoreConfig;
use crate::storage::{FileStore, KeyValueStore};
use crate::store::{NewOption, TemplateStore};
use crate::template::{OptionKind, OptionPatch, Template};
use crate::wheel::{self, DrawOutcome};
use serde::Serialize;
use std::path::Path;
use tracing::info;

pub const STORAGE_FILE: &str = "wheel.json";

// Shared state only holds the store; every screen reads through it.
pub struct AppState<S = FileStore> {
    pub store: TemplateStore<S>,
}

impl AppState<FileStore> {
    /// Opens `<data_dir>/wheel.json` with config from the environment.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, String> {
        let config = StoreConfig::from_env().map_err(|e| e.to_string())?;
        let backend = FileStore::open(data_dir.as_ref().join(STORAGE_FILE))
            .await
            .map_err(|e| e.to_string())?;
        let store = TemplateStore::with_config(backend, config).map_err(|e| e.to_string())?;
        info!(dir = %data_dir.as_ref().display(), "App state ready");
        Ok(Self { store })
    }
}

impl<S: KeyValueStore> AppState<S> {
    pub fn new(store: TemplateStore<S>) -> Self {
        Self { store }
    }
}

/// Everything the wheel screen needs in one call.
#[derive(Serialize, Debug, Clone)]
pub struct HomeView {
    pub template: Option<Template>,
    pub hide_picked: bool,
    pub eligible_ids: Vec<String>,
    /// The last shown result should be cleared.
    pub clear_result: bool,
}

/// Template editor listing.
#[derive(Serialize, Debug, Clone)]
pub struct TemplatesView {
    pub templates: Vec<Template>,
    pub current_id: String,
}

/* ---------- 1.  WHEEL SCREEN ---------- */

pub async fn load_home<S: KeyValueStore>(state: &AppState<S>) -> Result<HomeView, String> {
    let template = state.store.current_template().await.map_err(|e| e.to_string())?;
    let hide_picked = state.store.hide_picked_enabled().await;
    let clear_result = state
        .store
        .take_clear_result_flag()
        .await
        .map_err(|e| e.to_string())?;

    let eligible_ids = template
        .as_ref()
        .map(|t| {
            wheel::eligible_options(t, hide_picked)
                .into_iter()
                .map(|o| o.id.clone())
                .collect()
        })
        .unwrap_or_default();

    Ok(HomeView {
        template,
        hide_picked,
        eligible_ids,
        clear_result,
    })
}

pub async fn spin_wheel<S: KeyValueStore>(
    state: &AppState<S>,
) -> Result<Option<DrawOutcome>, String> {
    let mut rng = rand_core::OsRng;
    state.store.spin(&mut rng).await.map_err(|e| e.to_string())
}

/// The user accepted "Switch to <name>?" after a sub-template win.
pub async fn switch_to_sub_template<S: KeyValueStore>(
    state: &AppState<S>,
    outcome: DrawOutcome,
) -> Result<bool, String> {
    state
        .store
        .follow_sub_template(&outcome)
        .await
        .map_err(|e| e.to_string())
}

pub async fn toggle_hide_picked<S: KeyValueStore>(
    state: &AppState<S>,
    enabled: bool,
) -> Result<(), String> {
    state
        .store
        .set_hide_picked_enabled(enabled)
        .await
        .map_err(|e| e.to_string())
}

pub async fn reset_picked<S: KeyValueStore>(state: &AppState<S>) -> Result<(), String> {
    let Some(template) = state.store.current_template().await.map_err(|e| e.to_string())?
    else {
        return Ok(());
    };
    state
        .store
        .clear_hidden_options(&template.id)
        .await
        .map_err(|e| e.to_string())
}

/* ---------- 2.  TEMPLATE EDITOR ---------- */

pub async fn load_templates<S: KeyValueStore>(
    state: &AppState<S>,
) -> Result<TemplatesView, String> {
    let templates = state.store.list_templates().await;
    let stored = state.store.current_template_id().await;
    let current_id = if templates.iter().any(|t| t.id == stored) {
        stored
    } else {
        templates.first().map(|t| t.id.clone()).unwrap_or_default()
    };
    Ok(TemplatesView {
        templates,
        current_id,
    })
}

pub async fn select_template<S: KeyValueStore>(
    state: &AppState<S>,
    template_id: String,
) -> Result<(), String> {
    state
        .store
        .select_template(&template_id)
        .await
        .map_err(|e| e.to_string())
}

/// Blank names are ignored, as the editor never creates unnamed templates.
pub async fn create_template<S: KeyValueStore>(
    state: &AppState<S>,
    name: String,
) -> Result<Option<Template>, String> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    state
        .store
        .create_template(name)
        .await
        .map(Some)
        .map_err(|e| e.to_string())
}

pub async fn delete_template<S: KeyValueStore>(
    state: &AppState<S>,
    template_id: String,
) -> Result<(), String> {
    state
        .store
        .delete_template(&template_id)
        .await
        .map_err(|e| e.to_string())
}

/// Blank names are ignored, the previous name stays.
pub async fn rename_template<S: KeyValueStore>(
    state: &AppState<S>,
    template_id: String,
    name: String,
) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(());
    }
    state
        .store
        .rename_template(&template_id, name)
        .await
        .map_err(|e| e.to_string())
}

/* ---------- 3.  OPTIONS ---------- */

pub async fn add_option<S: KeyValueStore>(
    state: &AppState<S>,
    template_id: String,
    kind: String,
    label: String,
    sub_template_id: String,
) -> Result<(), String> {
    let new = match OptionKind::select_kind(&kind)? {
        OptionKind::Text => NewOption::text(label),
        OptionKind::SubTemplate => NewOption::sub_template(sub_template_id),
    };
    state
        .store
        .add_option(&template_id, new)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Blank labels cancel the edit.
pub async fn edit_option_label<S: KeyValueStore>(
    state: &AppState<S>,
    template_id: String,
    option_id: String,
    label: String,
) -> Result<(), String> {
    let label = label.trim();
    if label.is_empty() {
        return Ok(());
    }
    state
        .store
        .update_option(&template_id, &option_id, OptionPatch::new().label(label))
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

pub async fn toggle_option<S: KeyValueStore>(
    state: &AppState<S>,
    template_id: String,
    option_id: String,
    enabled: bool,
) -> Result<(), String> {
    state
        .store
        .toggle_option_enabled(&template_id, &option_id, enabled)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

pub async fn delete_option<S: KeyValueStore>(
    state: &AppState<S>,
    template_id: String,
    option_id: String,
) -> Result<(), String> {
    state
        .store
        .delete_option(&template_id, &option_id)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

pub async fn move_option<S: KeyValueStore>(
    state: &AppState<S>,
    template_id: String,
    option_id: String,
    to_index: usize,
) -> Result<(), String> {
    state
        .store
        .reorder_option(&template_id, &option_id, to_index)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}
