use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference to an icon as written in menus and panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IconReference {
    Emoji { value: String },
    /// `library:name`; an empty library means the host's default set.
    Library { library: String, name: String },
    Svg { markup: String },
    Url { url: String },
}

fn is_url(raw: &str) -> bool {
    let lowered = raw.to_ascii_lowercase();
    ["http://", "https://", "data:", "/", "./"]
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

fn is_library_part(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for IconReference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err("Empty icon reference".to_string());
        }
        if raw.get(..4).is_some_and(|head| head.eq_ignore_ascii_case("<svg")) {
            return Ok(IconReference::Svg {
                markup: raw.to_string(),
            });
        }
        if is_url(raw) {
            return Ok(IconReference::Url { url: raw.to_string() });
        }
        if let Some((library, name)) = raw.split_once(':') {
            if is_library_part(library) && is_library_part(name) {
                return Ok(IconReference::Library {
                    library: library.to_string(),
                    name: name.to_string(),
                });
            }
        }
        if is_library_part(raw) {
            return Ok(IconReference::Library {
                library: String::new(),
                name: raw.to_string(),
            });
        }
        if !raw.is_ascii() {
            return Ok(IconReference::Emoji {
                value: raw.to_string(),
            });
        }
        Err(format!("Unrecognised icon reference: {}", s))
    }
}

impl fmt::Display for IconReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IconReference::Emoji { value } => f.write_str(value),
            IconReference::Library { library, name } if library.is_empty() => f.write_str(name),
            IconReference::Library { library, name } => write!(f, "{}:{}", library, name),
            IconReference::Svg { markup } => f.write_str(markup),
            IconReference::Url { url } => f.write_str(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!(
            "lucide:users".parse::<IconReference>().unwrap(),
            IconReference::Library {
                library: "lucide".into(),
                name: "users".into()
            }
        );
        assert!(matches!(
            "https://cdn.example.com/i.png".parse::<IconReference>().unwrap(),
            IconReference::Url { .. }
        ));
        assert!(matches!(
            "<SVG viewBox='0 0 1 1'/>".parse::<IconReference>().unwrap(),
            IconReference::Svg { .. }
        ));
        assert!(matches!(
            "📊".parse::<IconReference>().unwrap(),
            IconReference::Emoji { .. }
        ));
        assert!("".parse::<IconReference>().is_err());
        assert!("not an icon!".parse::<IconReference>().is_err());
    }

    #[test]
    fn test_render_parse_round_trip() {
        let refs = vec![
            IconReference::Emoji { value: "🚀".into() },
            IconReference::Library {
                library: "heroicons".into(),
                name: "home-solid".into(),
            },
            IconReference::Library {
                library: String::new(),
                name: "users".into(),
            },
            IconReference::Svg {
                markup: "<svg><path d='M0 0'/></svg>".into(),
            },
            IconReference::Url {
                url: "/static/icons/logo.svg".into(),
            },
        ];
        for reference in refs {
            let rendered = reference.to_string();
            assert_eq!(rendered.parse::<IconReference>().unwrap(), reference);
        }
    }
}
