use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::panel::{Action, Field, Filter, PanelTab};
use crate::model::theme::ThemeSelection;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldGroups {
    pub list: Vec<Field>,
    pub form: Vec<Field>,
    pub detail: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBlock {
    pub endpoint: String,
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkBlock {
    pub endpoint: String,
    pub supports_rollback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaHint {
    pub library_path: String,
    pub accept: Vec<String>,
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaBlock {
    pub library_path: String,
    /// Field name → hint, for every media-typed field of the panel.
    pub fields: BTreeMap<String, MediaHint>,
}

/// External shape of a panel as consumed by the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelSchema {
    pub name: String,
    pub fields: FieldGroups,
    pub filters: Vec<Filter>,
    pub actions: Vec<Action>,
    pub bulk_actions: Vec<Action>,
    pub tabs: Vec<PanelTab>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk: Option<BulkBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeSelection>,
}
