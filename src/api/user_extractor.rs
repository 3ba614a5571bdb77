use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::model::{AdminContext, RenderMode, ThemeOverride};

/// Axum extractor for AdminContext from request headers
///
/// Recognized headers:
/// - X-User-Id: viewer identifier, anonymous when absent
/// - X-Tenant-Id / X-Org-Id: optional scope identifiers
/// - X-Locale: requested locale
/// - X-Render-Mode: `client` or `ssr`
/// - X-Theme / X-Theme-Variant: per-request theme override
/// - X-Request-Id: copied into the `request_id` attribute
///
/// An unparsable render mode is rejected with 400. Authentication is left to
/// the configured authenticator.
#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context_from_headers(&parts.headers)
    }
}

pub fn context_from_headers(headers: &HeaderMap) -> Result<AdminContext, StatusCode> {
    let mut ctx = AdminContext::new(extract_header_value(headers, "x-user-id").unwrap_or_default());
    ctx.tenant_id = extract_header_value(headers, "x-tenant-id");
    ctx.org_id = extract_header_value(headers, "x-org-id");
    if let Some(locale) = extract_header_value(headers, "x-locale") {
        ctx.locale = locale;
    }
    if let Some(mode) = extract_header_value(headers, "x-render-mode") {
        let mode: RenderMode = mode.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
        ctx.render_mode = Some(mode);
    }

    let theme = extract_header_value(headers, "x-theme");
    let variant = extract_header_value(headers, "x-theme-variant");
    if theme.is_some() || variant.is_some() {
        ctx.theme = Some(ThemeOverride {
            name: theme.unwrap_or_default(),
            variant: variant.unwrap_or_default(),
        });
    }
    if let Some(request_id) = extract_header_value(headers, "x-request-id") {
        ctx.attributes.insert("request_id".to_string(), request_id);
    }
    Ok(ctx)
}

/// Extract a non-blank header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
