use serde_json::{Map, Value};
use uuid::Uuid;

pub type Id = String;

/// Free-form JSON object used for configs, payloads and metadata.
pub type JsonMap = Map<String, Value>;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Lowercase slug: runs of anything outside `[a-z0-9]` collapse to a single
/// `-`, and leading/trailing `-`/`_` are stripped.
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    out.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Deterministic identifier for anything keyed by a slug (menus, widget areas).
pub fn slug_uuid(slug: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, slug.as_bytes())
}

/// Clamp a widget span into the 12 column grid; zero or negative means full width.
pub fn clamp_span(span: i32) -> i32 {
    if span <= 0 {
        12
    } else {
        span.min(12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_and_trims() {
        assert_eq!(slugify("  Content Pages!! "), "content-pages");
        assert_eq!(slugify("--Users & Roles__"), "users-roles");
        assert_eq!(slugify("already-slugged"), "already-slugged");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_slug_uuid_is_stable() {
        assert_eq!(slug_uuid("admin.main"), slug_uuid("admin.main"));
        assert_ne!(slug_uuid("admin.main"), slug_uuid("admin.footer"));
    }

    #[test]
    fn test_clamp_span() {
        assert_eq!(clamp_span(0), 12);
        assert_eq!(clamp_span(-3), 12);
        assert_eq!(clamp_span(4), 4);
        assert_eq!(clamp_span(40), 12);
    }
}
