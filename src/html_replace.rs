//! Asset inclusion in rendered pages.
//!
//! Pages list their development assets inside
//! `<!-- build:<set> -->` ... `<!-- endbuild -->` blocks. Each block is
//! replaced with one tag pointing at the bundled file of that set. Blocks
//! naming an unknown set are removed.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref BUILD_BLOCK: Regex = Regex::new(
        r"<!--\s*build:([0-9a-zA-Z_./-]+)\s*-->(?s:.*?)<!--\s*endbuild\s*-->"
    ).unwrap();
    static ref INVALID_ID_CHAR: Regex = Regex::new(r"[^0-9a-zA-Z_-]").unwrap();
}

/// `main.css` and `main_css` name the same block.
fn block_id(set: &str) -> String {
    INVALID_ID_CHAR.replace_all(set, "_").into_owned()
}

#[derive(Debug, Clone, Default)]
pub struct HtmlReplace {
    /// block id to replacement tag
    tags: IndexMap<String, String>,
}

impl HtmlReplace {
    /// `sets` maps each set name to the built file, relative to the build root.
    pub fn new(sets: &IndexMap<String, String>) -> Self {
        let tags = sets
            .iter()
            .filter_map(|(set, file)| {
                let tag = if set.ends_with(".js") {
                    format!("<script src=\"../{}\"></script>", file)
                } else if set.ends_with(".css") {
                    format!("<link href=\"../{}\" rel=\"stylesheet\" />", file)
                } else {
                    return None;
                };
                Some((block_id(set), tag))
            })
            .collect();
        Self { tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn apply(&self, content: &str) -> String {
        BUILD_BLOCK
            .replace_all(content, |caps: &Captures| {
                self.tags.get(&block_id(&caps[1])).cloned().unwrap_or_else(|| {
                    log::debug!("Removing build block for unknown set |{}|", &caps[1]);
                    String::new()
                })
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace() -> HtmlReplace {
        let mut sets = IndexMap::new();
        sets.insert("css/main.css".to_string(), "css/main.1a2b.min.css".to_string());
        sets.insert("app.js".to_string(), "app.1a2b.min.js".to_string());
        HtmlReplace::new(&sets)
    }

    #[test]
    fn test_blocks_are_replaced_by_bundles() {
        let page = "<head>\n<!-- build:css/main.css -->\n<link href=\"less/a.css\" rel=\"stylesheet\">\n<link href=\"less/b.css\" rel=\"stylesheet\">\n<!-- endbuild -->\n</head>\n<body><!--build:app.js--><script src=\"js/a.js\"></script><!-- endbuild --></body>";
        assert_eq!(
            replace().apply(page),
            "<head>\n<link href=\"../css/main.1a2b.min.css\" rel=\"stylesheet\" />\n</head>\n<body><script src=\"../app.1a2b.min.js\"></script></body>"
        );
    }

    #[test]
    fn test_dotted_and_underscored_ids_match() {
        let page = "<!-- build:app_js --><script src=\"a.js\"></script><!-- endbuild -->";
        assert_eq!(replace().apply(page), "<script src=\"../app.1a2b.min.js\"></script>");
    }

    #[test]
    fn test_unknown_blocks_are_removed() {
        let page = "<p>a</p><!-- build:vendor.js --><script src=\"v.js\"></script><!-- endbuild --><p>b</p>";
        assert_eq!(replace().apply(page), "<p>a</p><p>b</p>");
        assert_eq!(HtmlReplace::default().apply("<p>plain</p>"), "<p>plain</p>");
    }
}
