//! Panel → external schema, plus the decoration and translation passes the
//! orchestrator runs over it.

use std::collections::BTreeMap;

use crate::contracts::Translator;
use crate::logic::navigation::translate;
use crate::model::{
    Action, BulkBlock, ExportBlock, Field, FieldGroups, FieldOption, Filter, MediaBlock, MediaHint,
    Panel, PanelSchema, PanelTab,
};

pub const EXPORT_FORMATS: [&str; 3] = ["csv", "json", "xlsx"];

/// Undecorated copy of the panel's declared shape.
pub fn base_schema(panel: &Panel) -> PanelSchema {
    PanelSchema {
        name: panel.name.clone(),
        fields: FieldGroups {
            list: panel.list_fields.clone(),
            form: panel.form_fields.clone(),
            detail: panel.detail_fields.clone(),
        },
        filters: panel.filters.clone(),
        actions: panel.actions.clone(),
        bulk_actions: panel.bulk_actions.clone(),
        tabs: Vec::new(),
        export: None,
        bulk: None,
        media: None,
        theme: None,
    }
}

pub fn export_block(api_base: &str, panel: &str) -> ExportBlock {
    ExportBlock {
        endpoint: format!("{}/panels/{}/export", api_base.trim_end_matches('/'), panel),
        formats: EXPORT_FORMATS.iter().map(|f| f.to_string()).collect(),
    }
}

pub fn bulk_block(api_base: &str, panel: &str, supports_rollback: bool) -> BulkBlock {
    BulkBlock {
        endpoint: format!("{}/panels/{}/bulk", api_base.trim_end_matches('/'), panel),
        supports_rollback,
    }
}

fn media_hint(field: &Field, library_path: &str) -> MediaHint {
    let (accept, multiple) = match field.field_type.as_str() {
        "image" => (vec!["image/*"], false),
        "gallery" => (vec!["image/*"], true),
        _ => (vec!["*/*"], false),
    };
    MediaHint {
        library_path: library_path.to_string(),
        accept: accept.into_iter().map(String::from).collect(),
        multiple,
    }
}

/// Hints for every media-typed field across the field groups; `None` when
/// the panel has no such field.
pub fn media_block(schema: &PanelSchema, library_path: &str) -> Option<MediaBlock> {
    let fields: BTreeMap<String, MediaHint> = schema
        .fields
        .list
        .iter()
        .chain(&schema.fields.form)
        .chain(&schema.fields.detail)
        .filter(|f| f.is_media())
        .map(|f| (f.name.clone(), media_hint(f, library_path)))
        .collect();
    if fields.is_empty() {
        return None;
    }
    Some(MediaBlock {
        library_path: library_path.to_string(),
        fields,
    })
}

fn localize(label: &mut String, key: &str, translator: &dyn Translator, locale: &str) {
    if let Some(text) = translate(translator, locale, key) {
        *label = text;
    }
}

fn localize_options(options: &mut [FieldOption], translator: &dyn Translator, locale: &str) {
    for option in options {
        localize(&mut option.label, &option.label_key, translator, locale);
    }
}

fn localize_fields(fields: &mut [Field], translator: &dyn Translator, locale: &str) {
    for field in fields {
        localize(&mut field.label, &field.label_key, translator, locale);
        localize_options(&mut field.options, translator, locale);
    }
}

fn localize_filters(filters: &mut [Filter], translator: &dyn Translator, locale: &str) {
    for filter in filters {
        localize(&mut filter.label, &filter.label_key, translator, locale);
        localize_options(&mut filter.options, translator, locale);
    }
}

fn localize_actions(actions: &mut [Action], translator: &dyn Translator, locale: &str) {
    for action in actions {
        localize(&mut action.label, &action.label_key, translator, locale);
    }
}

fn localize_tabs(tabs: &mut [PanelTab], translator: &dyn Translator, locale: &str) {
    for tab in tabs {
        localize(&mut tab.label, &tab.label_key, translator, locale);
    }
}

/// Replaces every label whose key translates; the rest keep their label.
pub fn translate_schema(schema: &mut PanelSchema, translator: &dyn Translator, locale: &str) {
    localize_fields(&mut schema.fields.list, translator, locale);
    localize_fields(&mut schema.fields.form, translator, locale);
    localize_fields(&mut schema.fields.detail, translator, locale);
    localize_filters(&mut schema.filters, translator, locale);
    localize_actions(&mut schema.actions, translator, locale);
    localize_actions(&mut schema.bulk_actions, translator, locale);
    localize_tabs(&mut schema.tabs, translator, locale);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::StaticTranslator;
    use crate::model::PanelBuilder;

    fn panel() -> Panel {
        let mut builder = PanelBuilder::new()
            .list_fields(vec![
                Field::new("title", "Title", "text").with_label_key("fields.title"),
                Field::new("cover", "Cover", "image"),
            ])
            .form_fields(vec![
                Field::new("status", "Status", "select")
                    .with_option("draft", "Draft", "status.draft")
                    .with_option("live", "Live", "status.live"),
                Field::new("photos", "Photos", "gallery"),
            ]);
        builder.set_name("posts");
        builder.build().unwrap()
    }

    #[test]
    fn test_media_block_lists_media_fields() {
        let schema = base_schema(&panel());
        let media = media_block(&schema, "/admin/api/media/library").unwrap();
        let names: Vec<_> = media.fields.keys().cloned().collect();
        assert_eq!(names, vec!["cover", "photos"]);
        assert!(media.fields["photos"].multiple);
        assert_eq!(media.fields["cover"].accept, vec!["image/*"]);

        let mut plain = PanelBuilder::new();
        plain.set_name("plain");
        assert!(media_block(&base_schema(&plain.build().unwrap()), "/m").is_none());
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(export_block("/admin/api/", "posts").endpoint, "/admin/api/panels/posts/export");
        let bulk = bulk_block("/admin/api", "posts", true);
        assert_eq!(bulk.endpoint, "/admin/api/panels/posts/bulk");
        assert!(bulk.supports_rollback);
    }

    #[test]
    fn test_translation_keeps_untranslated_labels() {
        let translator = StaticTranslator::new()
            .with("sv", "fields.title", "Titel")
            .with("sv", "status.draft", "Utkast");
        let mut schema = base_schema(&panel());
        translate_schema(&mut schema, &translator, "sv");
        assert_eq!(schema.fields.list[0].label, "Titel");
        assert_eq!(schema.fields.list[1].label, "Cover");
        assert_eq!(schema.fields.form[0].options[0].label, "Utkast");
        assert_eq!(schema.fields.form[0].options[1].label, "Live");
    }
}
