use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::admin::{MenuContributor, Module, ModuleContext};
use crate::contracts::{provider_fn, record_activity};
use crate::error::{AdminError, AdminResult};
use crate::logic::{CommandHandler, Message};
use crate::model::{
    Action, ActivityEntry, AdminContext, DashboardProviderSpec, Field, Filter, JsonMap, MenuItem,
    ModuleManifest, PanelBuilder, PanelTab, TabScope, TabTarget, AREA_MAIN, AREA_SIDEBAR,
};

pub const DEMO_PANEL: &str = "posts";
pub const PUBLISH_COMMAND: &str = "posts.publish";

#[derive(Debug, Clone, PartialEq)]
pub struct DemoPost {
    pub id: String,
    pub title: String,
    pub published: bool,
}

/// In-process content used by the demo panel, widgets and command.
#[derive(Debug, Default)]
pub struct DemoContent {
    posts: RwLock<Vec<DemoPost>>,
}

impl DemoContent {
    pub fn sample() -> Self {
        let posts = [("welcome", "Welcome", true), ("roadmap", "Roadmap", false), ("faq", "FAQ", false)]
            .into_iter()
            .map(|(id, title, published)| DemoPost {
                id: id.to_string(),
                title: title.to_string(),
                published,
            })
            .collect();
        Self {
            posts: RwLock::new(posts),
        }
    }

    pub fn posts(&self) -> Vec<DemoPost> {
        self.posts.read().clone()
    }

    /// Ids that exist and were not yet published.
    fn publish(&self, ids: &[String]) -> Vec<String> {
        let mut posts = self.posts.write();
        posts
            .iter_mut()
            .filter(|p| ids.contains(&p.id) && !p.published)
            .map(|p| {
                p.published = true;
                p.id.clone()
            })
            .collect()
    }

    fn stats(&self) -> JsonMap {
        let posts = self.posts.read();
        let published = posts.iter().filter(|p| p.published).count();
        let mut out = JsonMap::new();
        out.insert("total".to_string(), json!(posts.len()));
        out.insert("published".to_string(), json!(published));
        out.insert("drafts".to_string(), json!(posts.len() - published));
        out
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PublishPosts {
    #[serde(default)]
    pub ids: Vec<String>,
}

impl Message for PublishPosts {
    fn type_name(&self) -> &str {
        PUBLISH_COMMAND
    }

    fn validate(&self) -> AdminResult<()> {
        if self.ids.is_empty() {
            return Err(AdminError::field("ids", "at least one post id is required"));
        }
        Ok(())
    }
}

struct PublishHandler {
    content: Arc<DemoContent>,
    activity: Arc<dyn crate::contracts::ActivitySink>,
}

#[async_trait::async_trait]
impl CommandHandler<PublishPosts> for PublishHandler {
    async fn execute(&self, ctx: &AdminContext, message: PublishPosts) -> AdminResult<()> {
        let published = self.content.publish(&message.ids);
        for id in &published {
            let entry = ActivityEntry::new(&ctx.actor(), PUBLISH_COMMAND, &format!("post:{id}"));
            record_activity(&self.activity, ctx, entry).await;
        }
        Ok(())
    }
}

/// Small content module: a posts panel, two dashboard widgets, a publish
/// command and a menu entry.
pub struct DemoModule {
    content: Arc<DemoContent>,
    base_path: RwLock<String>,
}

impl DemoModule {
    pub fn new() -> Self {
        Self {
            content: Arc::new(DemoContent::sample()),
            base_path: RwLock::new("/admin".to_string()),
        }
    }

    pub fn content(&self) -> Arc<DemoContent> {
        self.content.clone()
    }

    fn panel(&self) -> PanelBuilder {
        PanelBuilder::new()
            .list_fields(vec![
                Field::new("title", "Title", "text").with_label_key("posts.fields.title"),
                Field::new("status", "Status", "select")
                    .with_option("draft", "Draft", "posts.status.draft")
                    .with_option("published", "Published", "posts.status.published"),
            ])
            .form_fields(vec![
                Field::new("title", "Title", "text").with_label_key("posts.fields.title"),
                Field::new("body", "Body", "richtext"),
                Field::new("cover", "Cover", "image"),
            ])
            .detail_fields(vec![Field::new("title", "Title", "text")])
            .filters(vec![Filter {
                name: "status".to_string(),
                label: "Status".to_string(),
                filter_type: "select".to_string(),
                ..Default::default()
            }])
            .actions(vec![Action::new("publish", "Publish", PUBLISH_COMMAND)])
            .bulk_actions(vec![Action::new("publish", "Publish selected", PUBLISH_COMMAND)])
            .tab(
                PanelTab::new("revisions", "Revisions", TabScope::Detail)
                    .at(10)
                    .with_target(TabTarget::Custom {
                        kind: "revisions".to_string(),
                    }),
            )
    }
}

impl Default for DemoModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Module for DemoModule {
    fn manifest(&self) -> ModuleManifest {
        let mut manifest = ModuleManifest::new("demo", "Demo content");
        manifest.description = "Sample posts panel and widgets".to_string();
        manifest
    }

    async fn register(&self, ctx: &ModuleContext<'_>) -> AdminResult<()> {
        let admin = ctx.admin;
        *self.base_path.write() = admin.config().base_path.clone();
        admin.register_panel(DEMO_PANEL, self.panel())?;

        let bus = admin.commands();
        if !bus.has_factory(PUBLISH_COMMAND) {
            bus.register_message::<PublishPosts>()?;
            bus.register_command::<PublishPosts, _>(PublishHandler {
                content: self.content.clone(),
                activity: admin.activity_sink(),
            })?;
        }

        let content = self.content.clone();
        let stats = provider_fn(move |_ctx: AdminContext, _config: JsonMap| {
            let content = content.clone();
            async move { Ok::<_, anyhow::Error>(content.stats()) }
        });
        admin
            .register_dashboard_provider(
                DashboardProviderSpec::new("demo.post_stats", stats)
                    .in_area(AREA_MAIN)
                    .with_span(6)
                    .with_command("demo.post_stats"),
            )
            .await?;

        let content = self.content.clone();
        let drafts = provider_fn(move |_ctx: AdminContext, config: JsonMap| {
            let content = content.clone();
            async move {
                let limit = config.get("limit").and_then(|v| v.as_u64()).unwrap_or(5) as usize;
                let titles: Vec<String> = content
                    .posts()
                    .into_iter()
                    .filter(|p| !p.published)
                    .take(limit)
                    .map(|p| p.title)
                    .collect();
                let mut out = JsonMap::new();
                out.insert("drafts".to_string(), json!(titles));
                Ok::<_, anyhow::Error>(out)
            }
        });
        let mut config = JsonMap::new();
        config.insert("limit".to_string(), json!(3));
        admin
            .register_dashboard_provider(
                DashboardProviderSpec::new("demo.recent_drafts", drafts)
                    .in_area(AREA_SIDEBAR)
                    .with_span(4)
                    .with_config(config),
            )
            .await?;
        Ok(())
    }

    fn menu_contributor(&self) -> Option<&dyn MenuContributor> {
        Some(self)
    }
}

impl MenuContributor for DemoModule {
    fn menu_items(&self, _locale: &str) -> Vec<MenuItem> {
        let mut posts = MenuItem::new("posts", "Posts")
            .with_target("type", json!("url"))
            .with_target("path", json!(format!("{}/posts", self.base_path.read())))
            .with_icon("lucide:file-text")
            .at(10);
        posts.label_key = "menu.posts".to_string();
        vec![posts]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_only_touches_drafts() {
        let content = DemoContent::sample();
        let published = content.publish(&["welcome".to_string(), "faq".to_string(), "nope".to_string()]);
        assert_eq!(published, vec!["faq"]);
        assert_eq!(content.stats()["drafts"], json!(1));
    }

    #[test]
    fn test_publish_message_requires_ids() {
        assert!(Message::validate(&PublishPosts::default()).is_err());
    }
}
