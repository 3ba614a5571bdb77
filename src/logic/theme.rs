use serde_json::Value;
use std::sync::Arc;

use crate::contracts::ThemeProvider;
use crate::model::{AdminContext, ThemeOverride, ThemeSelection};

pub const THEME_PREFERENCE_KEY: &str = "theme";

fn overlay(selection: &mut ThemeSelection, name: &str, variant: &str) {
    if !name.trim().is_empty() {
        selection.name = name.trim().to_string();
    }
    if !variant.trim().is_empty() {
        selection.variant = variant.trim().to_string();
    }
}

/// Reads a stored `{name, variant}` preference; anything else is ignored.
pub fn theme_preference(value: &Value) -> Option<ThemeOverride> {
    serde_json::from_value(value.clone()).ok()
}

/// Base selection, then the user's stored preference, then the request
/// override, then the provider. Chart theme falls back to the variant.
pub fn resolve_theme(
    base: &ThemeSelection,
    preference: Option<&ThemeOverride>,
    ctx: &AdminContext,
    provider: Option<&Arc<dyn ThemeProvider>>,
) -> ThemeSelection {
    let mut selection = base.clone();
    if let Some(pref) = preference {
        overlay(&mut selection, &pref.name, &pref.variant);
    }
    if let Some(request) = &ctx.theme {
        overlay(&mut selection, &request.name, &request.variant);
    }
    if let Some(provider) = provider {
        selection = provider.resolve(ctx, selection);
    }
    if selection.chart_theme.trim().is_empty() {
        selection.chart_theme = selection.variant.clone();
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> ThemeSelection {
        ThemeSelection {
            name: "admin".into(),
            variant: "light".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_overlays_apply_in_order() {
        let pref = theme_preference(&json!({ "name": "", "variant": "dark" })).unwrap();
        let ctx = AdminContext::anonymous().with_theme(ThemeOverride {
            name: "brand".into(),
            variant: String::new(),
        });
        let theme = resolve_theme(&base(), Some(&pref), &ctx, None);
        assert_eq!(theme.name, "brand");
        assert_eq!(theme.variant, "dark");
        assert_eq!(theme.chart_theme, "dark");
    }

    #[test]
    fn test_provider_runs_last() {
        struct HighContrast;
        impl ThemeProvider for HighContrast {
            fn resolve(&self, _ctx: &AdminContext, mut selection: ThemeSelection) -> ThemeSelection {
                selection.variant = "contrast".into();
                selection.chart_theme = "mono".into();
                selection
            }
        }
        let provider: Arc<dyn ThemeProvider> = Arc::new(HighContrast);
        let theme = resolve_theme(&base(), None, &AdminContext::anonymous(), Some(&provider));
        assert_eq!(theme.variant, "contrast");
        assert_eq!(theme.chart_theme, "mono");
    }
}
