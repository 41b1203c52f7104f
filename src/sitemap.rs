//! XML sitemap generation.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:xhtml="http://www.w3.org/1999/xhtml">
//! <url>
//! <loc>http://example.org/</loc>
//! <xhtml:link rel="alternate" hreflang="en" href="http://example.org/" />
//! <xhtml:link rel="alternate" hreflang="fr" href="http://example.org/fr/" />
//! <priority>0.8</priority>
//! <changefreq>weekly</changefreq>
//! </url>
//! </urlset>
//! ```

use indexmap::IndexMap;

use crate::config::XmlSitemapDefaults;
use crate::context::SiteContext;

/// Output file name, relative to the build directory
pub const SITEMAP_FILE: &str = "sitemap.xml";

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
const AUTO: &str = "auto";

/// Sitemap of one build, one URL per target entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlSitemap {
    urls: Vec<UrlEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEntry {
    pub loc: String,
    /// Language code to canonical URL, self included
    pub alternates: IndexMap<String, String>,
    pub priority: Option<String>,
    pub frequency: Option<String>,
}

/// A per-content hint wins unless it is `auto`; then the site default
/// applies unless it is `auto` too.
fn resolve_hint(hint: Option<&str>, default: Option<&str>) -> Option<String> {
    hint.filter(|h| !h.is_empty() && *h != AUTO)
        .or_else(|| default.filter(|d| !d.is_empty() && *d != AUTO))
        .map(str::to_string)
}

impl XmlSitemap {
    /// Collect the target entries of `context` in insertion order.
    pub fn from_context(context: &SiteContext, defaults: &XmlSitemapDefaults) -> Self {
        let mut urls: IndexMap<String, UrlEntry> = IndexMap::new();

        for (_, entry) in context.entries().filter(|(_, entry)| entry.is_target()) {
            let Some(loc) = entry.canonical_url.clone() else {
                continue;
            };
            // the first entry for a URL wins
            if urls.contains_key(&loc) {
                continue;
            }

            let alternates = context
                .get(&entry.reference)
                .map(|reference| {
                    reference
                        .translation_set
                        .iter()
                        .filter_map(|(lang, path)| {
                            context
                                .get(path)
                                .and_then(|other| other.canonical_url.clone())
                                .map(|url| (lang.clone(), url))
                        })
                        .collect()
                })
                .unwrap_or_default();

            urls.insert(
                loc.clone(),
                UrlEntry {
                    loc,
                    alternates,
                    priority: resolve_hint(
                        entry.xmlsitemap.priority.as_deref(),
                        defaults.default_priority.as_deref(),
                    ),
                    frequency: resolve_hint(
                        entry.xmlsitemap.frequency.as_deref(),
                        defaults.default_change_frequency.as_deref(),
                    ),
                },
            );
        }

        Self {
            urls: urls.into_values().collect(),
        }
    }

    pub fn urls(&self) -> &[UrlEntry] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.urls.len() * 256);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<urlset xmlns=\"{}\" xmlns:xhtml=\"{}\">\n",
            SITEMAP_NS, XHTML_NS
        ));

        for url in &self.urls {
            xml.push_str("<url>\n");
            xml.push_str(&format!("<loc>{}</loc>\n", html_escape::encode_text(&url.loc)));
            for (lang, href) in &url.alternates {
                xml.push_str(&format!(
                    "<xhtml:link rel=\"alternate\" hreflang=\"{}\" href=\"{}\" />\n",
                    html_escape::encode_double_quoted_attribute(lang),
                    html_escape::encode_double_quoted_attribute(href)
                ));
            }
            if let Some(priority) = &url.priority {
                xml.push_str(&format!("<priority>{}</priority>\n", html_escape::encode_text(priority)));
            }
            if let Some(frequency) = &url.frequency {
                xml.push_str(&format!("<changefreq>{}</changefreq>\n", html_escape::encode_text(frequency)));
            }
            xml.push_str("</url>\n");
        }

        xml.push_str("</urlset>");
        xml
    }
}
