use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::contracts::{ActivitySink, Authorizer, TranslationPolicy, WorkflowEngine};
use crate::error::{AdminError, AdminResult};
use crate::logic::command_bus::CommandBus;
use crate::model::common::slugify;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub required: bool,
}

impl Field {
    pub fn new(name: &str, label: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            field_type: field_type.to_string(),
            ..Default::default()
        }
    }

    pub fn with_label_key(mut self, key: &str) -> Self {
        self.label_key = key.to_string();
        self
    }

    pub fn with_option(mut self, value: &str, label: &str, label_key: &str) -> Self {
        self.options.push(FieldOption {
            value: value.to_string(),
            label: label.to_string(),
            label_key: label_key.to_string(),
        });
        self
    }

    pub fn is_media(&self) -> bool {
        matches!(
            self.field_type.as_str(),
            "media" | "image" | "file" | "gallery" | "attachment"
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
    #[serde(rename = "type")]
    pub filter_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
    /// Command dispatched by name when the action is triggered.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub permission: String,
}

impl Action {
    pub fn new(name: &str, label: &str, command_name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            command_name: command_name.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabScope {
    #[default]
    List,
    Detail,
    Form,
}

impl fmt::Display for TabScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TabScope::List => write!(f, "list"),
            TabScope::Detail => write!(f, "detail"),
            TabScope::Form => write!(f, "form"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TabTarget {
    Panel {
        panel: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Url {
        url: String,
    },
    Custom {
        kind: String,
    },
}

impl TabTarget {
    /// Seed text used to derive a tab id when none is given.
    fn id_seed(&self) -> &str {
        match self {
            TabTarget::Panel { panel, .. } => panel,
            TabTarget::Url { url } => url,
            TabTarget::Custom { kind } => kind,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelTab {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TabTarget>,
    #[serde(default)]
    pub scope: TabScope,
    #[serde(default)]
    pub contexts: Vec<TabScope>,
    /// Zero means "no explicit position".
    #[serde(default)]
    pub position: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub permission: String,
}

impl PanelTab {
    pub fn new(id: &str, label: &str, scope: TabScope) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            scope,
            ..Default::default()
        }
    }

    pub fn at(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    pub fn with_target(mut self, target: TabTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_permission(mut self, permission: &str) -> Self {
        self.permission = permission.to_string();
        self
    }

    /// Stable id: explicit id, else slug of label, label key or target.
    pub fn derive_id(&self) -> Option<String> {
        let candidates = [
            self.id.as_str(),
            self.label.as_str(),
            self.label_key.as_str(),
            self.target.as_ref().map(TabTarget::id_seed).unwrap_or_default(),
        ];
        candidates
            .iter()
            .map(|c| slugify(c))
            .find(|slug| !slug.is_empty())
    }

    /// Fills id, default contexts and label; fails when no id can be derived.
    pub fn normalized(mut self) -> AdminResult<Self> {
        let id = self
            .derive_id()
            .ok_or_else(|| AdminError::required_field("tab.id"))?;
        if self.id.trim().is_empty() {
            self.id = id;
        } else {
            self.id = self.id.trim().to_string();
        }
        if self.contexts.is_empty() {
            self.contexts = vec![self.scope];
        }
        if self.label.trim().is_empty() {
            self.label = if self.label_key.is_empty() {
                self.id.clone()
            } else {
                self.label_key.clone()
            };
        }
        Ok(self)
    }
}

/// Resource view descriptor. Immutable once registered.
#[derive(Clone, Default)]
pub struct Panel {
    pub name: String,
    pub list_fields: Vec<Field>,
    pub form_fields: Vec<Field>,
    pub detail_fields: Vec<Field>,
    pub filters: Vec<Filter>,
    pub actions: Vec<Action>,
    pub bulk_actions: Vec<Action>,
    pub tabs: Vec<PanelTab>,
    pub permission: Option<String>,
    pub repository: Option<Arc<dyn Any + Send + Sync>>,
    pub workflow: Option<Arc<dyn WorkflowEngine>>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
    pub commands: Option<Arc<CommandBus>>,
    pub activity: Option<Arc<dyn ActivitySink>>,
    pub translation_policy: Option<Arc<dyn TranslationPolicy>>,
}

impl fmt::Debug for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Panel")
            .field("name", &self.name)
            .field("list_fields", &self.list_fields.len())
            .field("form_fields", &self.form_fields.len())
            .field("detail_fields", &self.detail_fields.len())
            .field("tabs", &self.tabs)
            .field("has_repository", &self.repository.is_some())
            .field("has_workflow", &self.workflow.is_some())
            .field("has_commands", &self.commands.is_some())
            .finish()
    }
}

/// Fluent builder handed to `Admin::register_panel`.
#[derive(Default)]
pub struct PanelBuilder {
    panel: Panel,
}

impl PanelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.panel.name
    }

    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.panel.name = name.to_string();
        self
    }

    pub fn list_fields(mut self, fields: Vec<Field>) -> Self {
        self.panel.list_fields = fields;
        self
    }

    pub fn form_fields(mut self, fields: Vec<Field>) -> Self {
        self.panel.form_fields = fields;
        self
    }

    pub fn detail_fields(mut self, fields: Vec<Field>) -> Self {
        self.panel.detail_fields = fields;
        self
    }

    pub fn filters(mut self, filters: Vec<Filter>) -> Self {
        self.panel.filters = filters;
        self
    }

    pub fn actions(mut self, actions: Vec<Action>) -> Self {
        self.panel.actions = actions;
        self
    }

    pub fn bulk_actions(mut self, actions: Vec<Action>) -> Self {
        self.panel.bulk_actions = actions;
        self
    }

    pub fn tab(mut self, tab: PanelTab) -> Self {
        self.panel.tabs.push(tab);
        self
    }

    pub fn permission(mut self, permission: &str) -> Self {
        self.panel.permission = Some(permission.to_string());
        self
    }

    pub fn repository(mut self, repository: Arc<dyn Any + Send + Sync>) -> Self {
        self.panel.repository = Some(repository);
        self
    }

    pub fn workflow(mut self, workflow: Arc<dyn WorkflowEngine>) -> Self {
        self.panel.workflow = Some(workflow);
        self
    }

    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.panel.authorizer = Some(authorizer);
        self
    }

    pub fn commands(mut self, bus: Arc<CommandBus>) -> Self {
        self.panel.commands = Some(bus);
        self
    }

    pub fn activity(mut self, sink: Arc<dyn ActivitySink>) -> Self {
        self.panel.activity = Some(sink);
        self
    }

    pub fn translation_policy(mut self, policy: Arc<dyn TranslationPolicy>) -> Self {
        self.panel.translation_policy = Some(policy);
        self
    }

    pub fn has_commands(&self) -> bool {
        self.panel.commands.is_some()
    }

    pub fn has_activity(&self) -> bool {
        self.panel.activity.is_some()
    }

    pub fn has_authorizer(&self) -> bool {
        self.panel.authorizer.is_some()
    }

    pub fn has_workflow(&self) -> bool {
        self.panel.workflow.is_some()
    }

    pub fn has_translation_policy(&self) -> bool {
        self.panel.translation_policy.is_some()
    }

    pub fn build(self) -> AdminResult<Panel> {
        if self.panel.name.trim().is_empty() {
            return Err(AdminError::required_field("panel.name"));
        }
        Ok(self.panel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_id_derivation_order() {
        let tab = PanelTab {
            label: "Recent Activity".to_string(),
            ..Default::default()
        };
        assert_eq!(tab.derive_id().as_deref(), Some("recent-activity"));

        let tab = PanelTab {
            target: Some(TabTarget::Panel {
                panel: "audit_log".to_string(),
                path: None,
            }),
            ..Default::default()
        };
        assert_eq!(tab.derive_id().as_deref(), Some("audit-log"));

        assert!(PanelTab::default().derive_id().is_none());
    }

    #[test]
    fn test_normalized_tab_defaults_contexts_to_scope() {
        let tab = PanelTab::new("activity", "", TabScope::Detail)
            .normalized()
            .unwrap();
        assert_eq!(tab.contexts, vec![TabScope::Detail]);
        assert_eq!(tab.label, "activity");
    }

    #[test]
    fn test_empty_tab_is_required_field() {
        let err = PanelTab::default().normalized().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::RequiredField);
    }

    #[test]
    fn test_builder_requires_name() {
        assert!(PanelBuilder::new().build().is_err());
        let mut builder = PanelBuilder::new().list_fields(vec![Field::new("email", "Email", "text")]);
        builder.set_name("users");
        let panel = builder.build().unwrap();
        assert_eq!(panel.name, "users");
        assert_eq!(panel.list_fields.len(), 1);
    }

    #[test]
    fn test_tab_target_serializes_tagged() {
        let target = TabTarget::Url {
            url: "/admin/docs".to_string(),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["type"], "url");
        assert_eq!(json["url"], "/admin/docs");
    }
}
