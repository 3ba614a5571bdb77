use std::sync::Arc;

use crate::admin::Admin;
use crate::error::{AdminError, AdminResult};
use crate::logic::panel_tabs::merge_panel_tabs;
use crate::logic::schema::{base_schema, bulk_block, export_block, media_block, translate_schema};
use crate::logic::{FeatureKey, KeepExisting, TabCollisionHandler, TabGate};
use crate::model::{AdminContext, Panel, PanelBuilder, PanelSchema, PanelTab};

pub const PANEL_RESOURCE: &str = "panel";

impl Admin {
    /// Names the builder, fills in every collaborator the builder left unset
    /// and registers the built panel.
    pub fn register_panel(&self, name: &str, mut builder: PanelBuilder) -> AdminResult<Arc<Panel>> {
        builder.set_name(name);
        if !builder.has_commands() {
            builder = builder.commands(self.commands().clone());
        }
        if !builder.has_activity() {
            builder = builder.activity(self.activity_sink());
        }
        if !builder.has_authorizer() {
            if let Some(authorizer) = self.authorizer() {
                builder = builder.authorizer(authorizer.clone());
            }
        }
        if !builder.has_workflow() {
            if let Some(workflow) = &self.workflow {
                builder = builder.workflow(workflow.clone());
            }
        }
        if !builder.has_translation_policy() {
            if let Some(policy) = &self.translation_policy {
                builder = builder.translation_policy(policy.clone());
            }
        }
        let panel = builder.build()?;
        let panel = self.registry().register_panel(name, panel)?;
        log::debug!("registered panel {}", name);
        Ok(panel)
    }

    fn collision_handler(&self) -> &dyn TabCollisionHandler {
        match &self.tab_collisions {
            Some(handler) => handler.as_ref(),
            None => &KeepExisting,
        }
    }

    /// Stores an extra tab for `panel`. With a collision handler installed,
    /// a tab reusing an existing id is resolved through it instead of failing
    /// as a duplicate.
    pub fn register_panel_tab(&self, panel: &str, mut tab: PanelTab) -> AdminResult<PanelTab> {
        if tab.id.trim().is_empty() {
            tab.id = tab
                .derive_id()
                .ok_or_else(|| AdminError::required_field("tab.id"))?;
        }
        let registry = self.registry();
        if let Some(handler) = &self.tab_collisions {
            if let Some(existing) = registry.find_panel_tab(panel, tab.id.trim()) {
                let incoming = tab.normalized()?;
                let chosen = handler.resolve(panel, &existing, &incoming)?.normalized()?;
                if chosen.id != existing.id && registry.find_panel_tab(panel, &chosen.id).is_some() {
                    return Err(AdminError::conflict(format!(
                        "panel {panel}: resolved tab {} collides with another tab",
                        chosen.id
                    )));
                }
                registry.set_panel_tab(panel, &existing.id, chosen.clone());
                return Ok(chosen);
            }
        }
        registry.register_panel_tab(panel, tab)
    }

    fn panel_for(&self, ctx: &AdminContext, name: &str) -> AdminResult<Arc<Panel>> {
        let panel = self
            .registry()
            .panel(name)
            .ok_or_else(|| AdminError::not_found("panel", name))?;
        if let Some(permission) = &panel.permission {
            let authorizer = panel.authorizer.as_ref().or(self.authorizer());
            if let Some(authorizer) = authorizer {
                if !authorizer.can(ctx, permission, PANEL_RESOURCE) {
                    return Err(AdminError::forbidden(permission));
                }
            }
        }
        Ok(panel)
    }

    /// Effective tabs of a registered panel for the viewer.
    pub fn resolve_panel_tabs(&self, ctx: &AdminContext, name: &str) -> AdminResult<Vec<PanelTab>> {
        let panel = self.panel_for(ctx, name)?;
        self.merge_tabs(ctx, &panel)
    }

    fn merge_tabs(&self, ctx: &AdminContext, panel: &Panel) -> AdminResult<Vec<PanelTab>> {
        let extra = self.registry().panel_tabs(&panel.name);
        let gate = TabGate {
            evaluator: self.tab_permissions.clone(),
            authorizer: panel
                .authorizer
                .clone()
                .or_else(|| self.authorizer().cloned()),
        };
        merge_panel_tabs(
            &panel.name,
            ctx,
            &panel.tabs,
            &extra,
            &gate,
            self.collision_handler(),
        )
    }

    /// External schema of a panel: declared shape, feature decorations,
    /// effective tabs and theme, localized for the viewer.
    pub async fn panel_schema(&self, ctx: &AdminContext, name: &str) -> AdminResult<PanelSchema> {
        let panel = self.panel_for(ctx, name)?;
        let mut schema = base_schema(&panel);
        let api_base = self.config().admin_api_base();

        if self.is_enabled(ctx, FeatureKey::Export) {
            schema.export = Some(export_block(&api_base, &panel.name));
        }
        if self.is_enabled(ctx, FeatureKey::Bulk) {
            let rollback = self.bulk.as_ref().is_some_and(|b| b.supports_rollback());
            schema.bulk = Some(bulk_block(&api_base, &panel.name, rollback));
        }
        if self.is_enabled(ctx, FeatureKey::Media) {
            schema.media = media_block(&schema, &self.config().cms.media_library_path);
        }
        schema.tabs = self.merge_tabs(ctx, &panel)?;
        schema.theme = Some(self.theme(ctx).await);

        if let Some(translator) = self.translator() {
            let locale = ctx.locale_or(&self.config().default_locale);
            translate_schema(&mut schema, translator.as_ref(), locale);
        }
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminConfig;
    use crate::contracts::{BulkService, StaticAuthorizer, StaticTranslator};
    use crate::error::ErrorKind;
    use crate::model::{Field, TabScope};
    use std::collections::BTreeMap;

    fn admin_with(features: &[&str]) -> Admin {
        let features: BTreeMap<String, bool> =
            features.iter().map(|f| (f.to_string(), true)).collect();
        Admin::in_memory(AdminConfig {
            features,
            ..Default::default()
        })
        .unwrap()
    }

    struct Rollback;

    impl BulkService for Rollback {
        fn supports_rollback(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_register_panel_injects_collaborators() {
        let authz = Arc::new(StaticAuthorizer::new().grant("root", "*"));
        let admin = admin_with(&[]).with_authorizer(authz);
        let panel = admin.register_panel("users", PanelBuilder::new()).unwrap();
        assert_eq!(panel.name, "users");
        assert!(panel.commands.is_some());
        assert!(panel.activity.is_some());
        assert!(panel.authorizer.is_some());
        assert!(panel.workflow.is_none());

        let err = admin.register_panel("users", PanelBuilder::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Duplicate);
    }

    #[test]
    fn test_tab_collision_handler_replaces_existing() {
        let admin = admin_with(&[]).with_tab_collision_handler(Arc::new(
            |_panel: &str, _existing: &PanelTab, incoming: &PanelTab| -> AdminResult<PanelTab> {
                Ok(incoming.clone())
            },
        ));
        admin
            .register_panel_tab("users", PanelTab::new("activity", "Activity", TabScope::Detail))
            .unwrap();
        let chosen = admin
            .register_panel_tab("users", PanelTab::new("activity", "Audit", TabScope::Detail))
            .unwrap();
        assert_eq!(chosen.label, "Audit");
        let tabs = admin.registry().panel_tabs("users");
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].label, "Audit");
    }

    #[test]
    fn test_duplicate_tab_without_handler_fails() {
        let admin = admin_with(&[]);
        admin
            .register_panel_tab("users", PanelTab::new("activity", "Activity", TabScope::Detail))
            .unwrap();
        let err = admin
            .register_panel_tab("users", PanelTab::new("activity", "Again", TabScope::Detail))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Duplicate);
    }

    #[test]
    fn test_tab_without_any_identity_is_required_field() {
        let err = admin_with(&[])
            .register_panel_tab("users", PanelTab::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequiredField);
    }

    #[tokio::test]
    async fn test_schema_decorations_follow_features() {
        let admin = admin_with(&["commands", "jobs", "cms", "export", "bulk", "media"])
            .with_bulk_service(Arc::new(Rollback));
        let builder = PanelBuilder::new().form_fields(vec![Field::new("avatar", "Avatar", "image")]);
        admin.register_panel("users", builder).unwrap();

        let schema = admin
            .panel_schema(&AdminContext::new("alice"), "users")
            .await
            .unwrap();
        assert_eq!(
            schema.export.unwrap().endpoint,
            "/admin/api/panels/users/export"
        );
        assert!(schema.bulk.unwrap().supports_rollback);
        assert!(schema.media.unwrap().fields.contains_key("avatar"));
        assert_eq!(schema.theme.unwrap().variant, "light");

        let plain = admin_with(&[]);
        plain.register_panel("users", PanelBuilder::new()).unwrap();
        let schema = plain
            .panel_schema(&AdminContext::new("alice"), "users")
            .await
            .unwrap();
        assert!(schema.export.is_none() && schema.bulk.is_none() && schema.media.is_none());
    }

    #[tokio::test]
    async fn test_schema_is_translated_for_context_locale() {
        let translator = StaticTranslator::new().with("sv", "fields.email", "E-post");
        let admin = admin_with(&[]).with_translator(Arc::new(translator));
        let builder = PanelBuilder::new()
            .list_fields(vec![Field::new("email", "Email", "text").with_label_key("fields.email")]);
        admin.register_panel("users", builder).unwrap();

        let sv = admin
            .panel_schema(&AdminContext::new("alice").with_locale("sv"), "users")
            .await
            .unwrap();
        assert_eq!(sv.fields.list[0].label, "E-post");
        let en = admin
            .panel_schema(&AdminContext::new("alice"), "users")
            .await
            .unwrap();
        assert_eq!(en.fields.list[0].label, "Email");
    }

    #[tokio::test]
    async fn test_panel_permission_is_enforced() {
        let authz = Arc::new(StaticAuthorizer::new().grant("alice", "users.view"));
        let admin = admin_with(&[]).with_authorizer(authz);
        admin
            .register_panel("users", PanelBuilder::new().permission("users.view"))
            .unwrap();
        assert!(admin
            .panel_schema(&AdminContext::new("alice"), "users")
            .await
            .is_ok());
        let err = admin
            .panel_schema(&AdminContext::new("bob"), "users")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
        let err = admin
            .panel_schema(&AdminContext::new("alice"), "missing")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
