//! The site-wide content context.
//!
//! Every content is reachable under its source path (a reference entry,
//! without target) and under each of its output paths (a target entry,
//! carrying the language and canonical URL). The context is assembled by
//! [`SiteContextBuilder`] and then handed out as a read-only [`SiteContext`].

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::Settings;
use crate::descriptor::{serialize_master, ContentDescriptor, SitemapHints};
use crate::error::BuildError;
use crate::links::DirectoryIndex;
use crate::navigation::{build_menus, Menus};

/// One entry of the site context, exposed to templates with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    /// Source path of the content
    pub reference: String,
    /// Output path for target entries, `false` for reference entries
    #[serde(serialize_with = "serialize_or_false")]
    pub target: Option<String>,
    pub translation_set: IndexMap<String, String>,
    pub title: String,
    pub short_title: String,
    #[serde(serialize_with = "serialize_master")]
    pub master: Option<String>,
    pub xmlsitemap: SitemapHints,
    pub more: serde_json::Map<String, serde_json::Value>,
    #[serde(serialize_with = "serialize_or_false")]
    pub canonical_url: Option<String>,
    #[serde(serialize_with = "serialize_or_false")]
    pub lang: Option<String>,
    pub root_url: String,
}

fn serialize_or_false<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(v) => serializer.serialize_str(v),
        None => serializer.serialize_bool(false),
    }
}

impl ContentEntry {
    pub fn is_target(&self) -> bool {
        self.target.is_some()
    }
}

/// Read-only view of the contents and menus of one build.
#[derive(Debug, Clone, Default)]
pub struct SiteContext {
    contents: IndexMap<String, ContentEntry>,
    menus: Menus,
    fallback_language: String,
}

impl SiteContext {
    /// Look up a content by source path or output path.
    pub fn get(&self, key: &str) -> Option<&ContentEntry> {
        self.contents.get(key)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ContentEntry)> {
        self.contents.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn menus(&self) -> &Menus {
        &self.menus
    }

    pub fn fallback_language(&self) -> &str {
        &self.fallback_language
    }

    /// Map any known path to the source path of its content. Unknown paths are returned as-is.
    pub fn source_path_of<'a>(&'a self, path: &'a str) -> &'a str {
        self.contents
            .get(path)
            .map(|entry| entry.reference.as_str())
            .unwrap_or(path)
    }

    /// Output path of `path` in `lang`, without leading `/`.
    pub fn output_path(&self, path: &str, lang: &str) -> Option<&str> {
        self.contents
            .get(path)
            .and_then(|entry| entry.translation_set.get(lang))
            .map(String::as_str)
    }

    /// Canonical URL of `path` in `lang`.
    pub fn canonical_url(&self, path: &str, lang: &str) -> Option<&str> {
        self.output_path(path, lang)
            .and_then(|target| self.contents.get(target))
            .and_then(|entry| entry.canonical_url.as_deref())
    }
}

/// Assembles a [`SiteContext`] from parsed descriptors.
#[derive(Debug)]
pub struct SiteContextBuilder {
    root_url: String,
    index: DirectoryIndex,
    fallback_language: String,
    contents: IndexMap<String, ContentEntry>,
    menus: Menus,
}

impl SiteContextBuilder {
    pub fn new(settings: &Settings) -> Result<Self, BuildError> {
        Ok(Self {
            root_url: settings.root_url.clone(),
            index: DirectoryIndex::new(settings.content.directory_index_pattern.as_deref())?,
            fallback_language: settings.i18n.fallback_language.clone(),
            contents: IndexMap::new(),
            menus: build_menus(&settings.content.sitemap)?,
        })
    }

    /// Builder without menus, for callers that supply their own values.
    pub fn with_values(root_url: impl Into<String>, index: DirectoryIndex, fallback_language: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            index,
            fallback_language: fallback_language.into(),
            contents: IndexMap::new(),
            menus: Menus::new(),
        }
    }

    pub fn menus(mut self, menus: Menus) -> Self {
        self.menus = menus;
        self
    }

    /// Register one content: its reference entry first, then one target entry per language.
    pub fn add(&mut self, descriptor: &ContentDescriptor) {
        let reference = ContentEntry {
            reference: descriptor.original_path.clone(),
            target: None,
            translation_set: descriptor.translation_set.clone(),
            title: descriptor.title.clone(),
            short_title: descriptor.short_title.clone(),
            master: descriptor.master.clone(),
            xmlsitemap: descriptor.sitemap_hints.clone(),
            more: descriptor.extra.clone(),
            canonical_url: None,
            lang: None,
            root_url: self.root_url.clone(),
        };

        self.contents
            .insert(descriptor.original_path.clone(), reference.clone());

        for (lang, path) in &descriptor.translation_set {
            let url = format!("{}/{}", self.root_url.trim_end_matches('/'), path);
            let target = ContentEntry {
                target: Some(path.clone()),
                lang: Some(lang.clone()),
                canonical_url: Some(self.index.strip(&url)),
                ..reference.clone()
            };
            // An output path equal to the source path replaces the reference
            // entry in place.
            self.contents.insert(path.clone(), target);
        }
    }

    pub fn build(self) -> SiteContext {
        SiteContext {
            contents: self.contents,
            menus: self.menus,
            fallback_language: self.fallback_language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorParser;
    use proptest::prelude::*;

    fn builder() -> SiteContextBuilder {
        SiteContextBuilder::with_values(
            "http://x",
            DirectoryIndex::new(Some(r"index\.html$")).unwrap(),
            "en",
        )
    }

    fn multilang() -> ContentDescriptor {
        let text = "<!-- start-content-config\npath:\n  en: /features/index.html\n  fr: /fonctions/index.html\ntitle: Features\nend-content-config -->";
        DescriptorParser::new("en").parse("features.hbs", text).unwrap()
    }

    #[test]
    fn test_reference_and_target_entries() {
        let mut builder = builder();
        builder.add(&multilang());
        let context = builder.build();

        let reference = context.get("features.hbs").unwrap();
        assert_eq!(reference.target, None);
        assert_eq!(reference.lang, None);

        let fr = context.get("fonctions/index.html").unwrap();
        assert_eq!(fr.target.as_deref(), Some("fonctions/index.html"));
        assert_eq!(fr.lang.as_deref(), Some("fr"));
        assert_eq!(fr.reference, "features.hbs");
        assert_eq!(fr.canonical_url.as_deref(), Some("http://x/fonctions/"));

        let keys: Vec<&str> = context.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["features.hbs", "features/index.html", "fonctions/index.html"]);
    }

    #[test]
    fn test_root_index_canonical_url() {
        let descriptor = DescriptorParser::new("en").parse("index.hbs", "").unwrap();
        let mut builder = builder();
        builder.add(&descriptor);
        let context = builder.build();

        assert_eq!(
            context.get("index.html").unwrap().canonical_url.as_deref(),
            Some("http://x/")
        );
        assert_eq!(context.canonical_url("index.hbs", "en"), Some("http://x/"));
        assert_eq!(context.output_path("index.hbs", "en"), Some("index.html"));
        assert_eq!(context.output_path("index.hbs", "de"), None);
    }

    #[test]
    fn test_same_source_and_output_path() {
        let descriptor = DescriptorParser::new("en").parse("page.html", "").unwrap();
        let mut builder = builder();
        builder.add(&descriptor);
        let context = builder.build();

        assert_eq!(context.len(), 1);
        let entry = context.get("page.html").unwrap();
        assert!(entry.is_target());
        assert_eq!(entry.reference, "page.html");
    }

    #[test]
    fn test_serialized_entry_shape() {
        let mut builder = builder();
        builder.add(&multilang());
        let context = builder.build();

        let reference = serde_json::to_value(context.get("features.hbs").unwrap()).unwrap();
        assert_eq!(reference["target"], serde_json::Value::Bool(false));
        assert_eq!(reference["canonicalUrl"], serde_json::Value::Bool(false));
        assert_eq!(reference["shortTitle"], "Features");
        assert_eq!(reference["translationSet"]["fr"], "fonctions/index.html");
    }

    #[test]
    fn test_source_path_of() {
        let mut builder = builder();
        builder.add(&multilang());
        let context = builder.build();
        assert_eq!(context.source_path_of("fonctions/index.html"), "features.hbs");
        assert_eq!(context.source_path_of("features.hbs"), "features.hbs");
        assert_eq!(context.source_path_of("unknown.html"), "unknown.html");
    }

    proptest! {
        #[test]
        fn prop_context_symmetry(
            names in proptest::collection::btree_set("[a-z]{1,8}", 1..6),
            languages in proptest::collection::btree_set("[a-z]{2}", 1..4),
        ) {
            let parser = DescriptorParser::new("en");
            let mut builder = builder();
            let mut descriptors = Vec::new();
            for name in &names {
                let paths: String = languages
                    .iter()
                    .map(|lang| format!("  {}: /{}/{}.html\n", lang, lang, name))
                    .collect();
                let text = format!("<!-- start-content-config\npath:\n{}end-content-config -->", paths);
                let descriptor = parser.parse(&format!("{}.md", name), &text).unwrap();
                builder.add(&descriptor);
                descriptors.push(descriptor);
            }
            let context = builder.build();

            for descriptor in &descriptors {
                let reference = context.get(&descriptor.original_path).unwrap();
                prop_assert!(reference.target.is_none());
                for (lang, path) in &descriptor.translation_set {
                    let entry = context.get(path).unwrap();
                    prop_assert_eq!(entry.target.as_deref(), Some(path.as_str()));
                    prop_assert_eq!(entry.lang.as_deref(), Some(lang.as_str()));
                    prop_assert_eq!(&entry.reference, &descriptor.original_path);
                }
            }
        }
    }
}
