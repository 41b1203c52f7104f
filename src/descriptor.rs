//! Content descriptor parsing.
//!
//! A content file may start with an inline YAML block between two sentinel
//! lines (`start-content-config` / `end-content-config`, usually wrapped in a
//! template or HTML comment). The block declares output paths, titles, the
//! page master and sitemap hints. Files without a block get defaults.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use serde_yaml::Value as YamlValue;

use crate::config::{deserialize_scalar, normalize_tabs};
use crate::error::BuildError;

lazy_static! {
    /// Captures everything between the line holding the start sentinel and the
    /// line holding the end sentinel
    static ref METADATA_BLOCK: Regex = Regex::new(
        r"start-content-config[^\n]*((?s:.*?))[^\n]*end-content-config"
    ).unwrap();

    /// `lang` attribute of the `<html>` element
    static ref HTML_LANG: Regex = Regex::new(
        r#"<html\s[^>]*?lang=["']([a-z\-]+)["'][^>]*>"#
    ).unwrap();

    static ref RENDERED_EXTENSION: Regex = Regex::new(r"\.(hbs|md)$").unwrap();
}

/// Per-content hints for the XML sitemap. `auto` means "use the site default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapHints {
    #[serde(default, deserialize_with = "deserialize_scalar", skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar", skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

/// Metadata of one content file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDescriptor {
    /// File name relative to the contents directory
    pub original_path: String,
    /// Language code to output path, without the leading `/`
    pub translation_set: IndexMap<String, String>,
    pub title: String,
    pub short_title: String,
    #[serde(serialize_with = "serialize_master")]
    pub master: Option<String>,
    pub sitemap_hints: SitemapHints,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Templates test `master` for falsiness, so an absent master is `false`.
pub(crate) fn serialize_master<S>(master: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match master {
        Some(name) => serializer.serialize_str(name),
        None => serializer.serialize_bool(false),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathDeclaration {
    Single(String),
    PerLanguage(IndexMap<String, String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    #[serde(default)]
    path: Option<PathDeclaration>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    short_title: Option<String>,
    #[serde(default)]
    master: Option<YamlValue>,
    #[serde(default)]
    xmlsitemap: Option<SitemapHints>,
    #[serde(default)]
    more: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Parses content files into [`ContentDescriptor`]s.
#[derive(Debug, Clone)]
pub struct DescriptorParser {
    fallback_language: String,
}

impl DescriptorParser {
    pub fn new(fallback_language: impl Into<String>) -> Self {
        Self {
            fallback_language: fallback_language.into(),
        }
    }

    /// Parse `text`, the contents of the file `relative` (relative to the contents directory).
    pub fn parse(&self, relative: &str, text: &str) -> Result<ContentDescriptor, BuildError> {
        if relative.contains('/') || relative.contains('\\') {
            return Err(BuildError::configuration(format!(
                "Error processing file |{}|: cannot be stored in subdirectory of |contents/|",
                relative
            )));
        }

        let metadata = match extract_metadata_block(text) {
            Some(block) => parse_metadata_block(relative, block)?,
            None => RawMetadata::default(),
        };

        let declaration = metadata.path.unwrap_or_else(|| {
            PathDeclaration::Single(format!("/{}", RENDERED_EXTENSION.replace(relative, ".html")))
        });
        let declared = match declaration {
            PathDeclaration::Single(path) => {
                let lang = detect_language(text).unwrap_or_else(|| self.fallback_language.clone());
                IndexMap::from([(lang, path)])
            }
            PathDeclaration::PerLanguage(paths) => paths,
        };

        let mut translation_set = IndexMap::with_capacity(declared.len());
        for (lang, path) in declared {
            let Some(stripped) = path.strip_prefix('/') else {
                return Err(BuildError::configuration(format!(
                    "Path |{}| does not start with / in |{}|.",
                    path, relative
                )));
            };
            translation_set.insert(lang, stripped.to_string());
        }
        if translation_set.is_empty() {
            return Err(BuildError::configuration(format!(
                "No output path declared in |{}|.",
                relative
            )));
        }

        let title = metadata
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| relative.to_string());
        let short_title = metadata
            .short_title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title.clone());

        Ok(ContentDescriptor {
            original_path: relative.to_string(),
            translation_set,
            title,
            short_title,
            master: parse_master(relative, metadata.master)?,
            sitemap_hints: metadata.xmlsitemap.unwrap_or_default(),
            extra: metadata.more.unwrap_or_default(),
        })
    }
}

fn extract_metadata_block(text: &str) -> Option<&str> {
    METADATA_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn parse_metadata_block(relative: &str, block: &str) -> Result<RawMetadata, BuildError> {
    let value: YamlValue = serde_yaml::from_str(&normalize_tabs(block)).map_err(|e| {
        BuildError::configuration(format!("Cannot parse YAML configuration in |{}|: {}", relative, e))
    })?;
    if value.is_null() {
        return Err(BuildError::configuration(format!(
            "Cannot parse YAML configuration in |{}|.",
            relative
        )));
    }
    serde_yaml::from_value(value).map_err(|e| {
        BuildError::configuration(format!("Invalid content configuration in |{}|: {}", relative, e))
    })
}

fn parse_master(relative: &str, master: Option<YamlValue>) -> Result<Option<String>, BuildError> {
    match master {
        None | Some(YamlValue::Null) | Some(YamlValue::Bool(false)) => Ok(None),
        Some(YamlValue::String(name)) if name.is_empty() => Ok(None),
        Some(YamlValue::String(name)) => Ok(Some(name)),
        Some(other) => Err(BuildError::configuration(format!(
            "Invalid master |{:?}| in |{}|: expected a name or false.",
            other, relative
        ))),
    }
}

/// Language declared on the `<html>` element, if any.
pub fn detect_language(text: &str) -> Option<String> {
    HTML_LANG
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> DescriptorParser {
        DescriptorParser::new("en")
    }

    #[test]
    fn test_defaults_without_metadata() {
        let descriptor = parser().parse("about.md", "# About\n").unwrap();

        assert_eq!(descriptor.original_path, "about.md");
        assert_eq!(descriptor.translation_set.get("en").unwrap(), "about.html");
        assert_eq!(descriptor.title, "about.md");
        assert_eq!(descriptor.short_title, "about.md");
        assert_eq!(descriptor.master, None);
        assert!(descriptor.extra.is_empty());
    }

    #[test]
    fn test_language_detection_for_single_path() {
        let text = "<!doctype html>\n<html class=\"no-js\" lang=\"fr\">\n<body></body></html>";
        let descriptor = parser().parse("page.html", text).unwrap();
        assert_eq!(
            descriptor.translation_set,
            IndexMap::from([("fr".to_string(), "page.html".to_string())])
        );
    }

    #[test]
    fn test_metadata_block() {
        let text = "{{!-- start-content-config\n\
            title: Features\n\
            shortTitle: Feat\n\
            master: default\n\
            path:\n\
            \ten: /features/index.html\n\
            \tfr: /features/index-fr.html\n\
            xmlsitemap:\n\
            \tpriority: 0.8\n\
            \tfrequency: weekly\n\
            more:\n\
            \tbanner: true\n\
            end-content-config --}}\n<p>body</p>";
        let descriptor = parser().parse("features.hbs", text).unwrap();

        assert_eq!(descriptor.title, "Features");
        assert_eq!(descriptor.short_title, "Feat");
        assert_eq!(descriptor.master.as_deref(), Some("default"));
        let languages: Vec<&str> = descriptor.translation_set.keys().map(String::as_str).collect();
        assert_eq!(languages, vec!["en", "fr"]);
        assert_eq!(descriptor.translation_set["fr"], "features/index-fr.html");
        assert_eq!(descriptor.sitemap_hints.priority.as_deref(), Some("0.8"));
        assert_eq!(descriptor.sitemap_hints.frequency.as_deref(), Some("weekly"));
        assert_eq!(descriptor.extra["banner"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_short_title_defaults_to_title() {
        let text = "<!-- start-content-config\ntitle: Home\nmaster: false\nend-content-config -->";
        let descriptor = parser().parse("index.hbs", text).unwrap();
        assert_eq!(descriptor.short_title, "Home");
        assert_eq!(descriptor.master, None);
    }

    #[test]
    fn test_relative_declared_path_is_rejected() {
        let text = "<!-- start-content-config\npath: about.html\nend-content-config -->";
        let err = parser().parse("about.hbs", text).unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
        assert!(err.to_string().contains("does not start with /"));
    }

    #[test]
    fn test_nested_file_is_rejected() {
        let err = parser().parse("blog/post.md", "text").unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn test_unparsable_block_is_rejected() {
        let text = "<!-- start-content-config\npath: [unclosed\nend-content-config -->";
        assert!(parser().parse("bad.hbs", text).is_err());

        let empty = "<!-- start-content-config\n\nend-content-config -->";
        assert!(parser().parse("empty.hbs", empty).is_err());
    }

    #[test]
    fn test_master_serializes_as_false_when_absent() {
        let descriptor = parser().parse("about.md", "").unwrap();
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["master"], serde_json::Value::Bool(false));
        assert_eq!(json["originalPath"], "about.md");
    }
}
