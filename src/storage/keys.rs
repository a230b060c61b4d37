/// Logical keys the store reads and writes, under one namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub templates: String,
    pub current_template_id: String,
    pub hide_picked_enabled: String,
    pub clear_result_flag: String,
}

impl StorageKeys {
    pub const DEFAULT_PREFIX: &'static str = "jp.";

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            templates: format!("{}templates", prefix),
            current_template_id: format!("{}currentTemplateId", prefix),
            hide_picked_enabled: format!("{}hidePickedEnabled", prefix),
            clear_result_flag: format!("{}clearResultFlag", prefix),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::with_prefix(Self::DEFAULT_PREFIX)
    }
}
