//! Link rewriting for the output layout.
//!
//! Content sources are authored one level below a virtual root, and every
//! output file may land in its own subdirectory. Relative links found in
//! markup attributes and in CSS `url()` references are rewritten so they
//! resolve from the output file's final location.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::BuildError;

lazy_static! {
    /// `src="..."`, `href='...'`
    static ref MARKUP_LINK: Regex = Regex::new(
        r#"(src|href)=(?:"([^"]*)"|'([^']*)')"#
    ).unwrap();

    /// `url("...")`, `url('...')`
    static ref CSS_URL: Regex = Regex::new(
        r#"url\((?:"([^"]*)"|'([^']*)')\)"#
    ).unwrap();

    /// `https:`, `mailto:`, `tel:`, `javascript:`
    static ref SCHEME: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").unwrap();
}

/// Removes the configured directory index file name from the end of paths.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    patterns: Option<(Regex, Regex)>,
}

impl DirectoryIndex {
    /// `pattern` is a regex such as `index\.html$`. `None` disables stripping.
    pub fn new(pattern: Option<&str>) -> Result<Self, BuildError> {
        let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
            return Ok(Self::default());
        };
        let compile = |source: String| {
            Regex::new(&source).map_err(|e| {
                BuildError::configuration(format!("Invalid directory index pattern |{}|: {}", pattern, e))
            })
        };
        let anchored = compile(format!("^(?:{})", pattern))?;
        let unanchored = compile(pattern.to_string())?;
        Ok(Self {
            patterns: Some((anchored, unanchored)),
        })
    }

    /// `section/index.html` becomes `section/`, a bare `index.html` becomes `./`.
    pub fn strip(&self, path: &str) -> String {
        match &self.patterns {
            Some((anchored, _)) if anchored.is_match(path) => "./".to_string(),
            Some((_, pattern)) => pattern.replace(path, "").into_owned(),
            None => path.to_string(),
        }
    }
}

/// Where a link was found. Each surface has its own match shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSurface {
    /// `src=`/`href=` attributes with quoted values
    Markup,
    /// CSS `url()` with a quoted argument
    Css,
}

impl LinkSurface {
    fn pattern(self) -> &'static Regex {
        match self {
            LinkSurface::Markup => &MARKUP_LINK,
            LinkSurface::Css => &CSS_URL,
        }
    }

    /// Split a match into the text before the link, the link, and the text after it.
    fn split<'h>(self, caps: &Captures<'h>) -> Option<(String, &'h str, String)> {
        let (first, second) = match self {
            LinkSurface::Markup => (2, 3),
            LinkSurface::Css => (1, 2),
        };
        let (quote, link) = match (caps.get(first), caps.get(second)) {
            (Some(m), _) => ('"', m.as_str()),
            (None, Some(m)) => ('\'', m.as_str()),
            (None, None) => return None,
        };

        Some(match self {
            LinkSurface::Markup => {
                let attribute = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                (format!("{}={}", attribute, quote), link, quote.to_string())
            }
            LinkSurface::Css => (format!("url({}", quote), link, format!("{})", quote)),
        })
    }
}

/// Whether a link is left untouched: empty, absolute, an anchor, or carrying a URI scheme.
pub fn is_passthrough(link: &str) -> bool {
    link.is_empty() || link.starts_with('/') || link.starts_with('#') || SCHEME.is_match(link)
}

#[derive(Debug, Clone, Default)]
pub struct LinkRewriter {
    index: DirectoryIndex,
}

impl LinkRewriter {
    pub fn new(index: DirectoryIndex) -> Self {
        Self { index }
    }

    /// Rewrite every relative link of `surface` found in `content`, the
    /// contents of the output file at `file_path` (relative to the build root).
    pub fn rewrite(&self, surface: LinkSurface, file_path: &str, content: &str) -> String {
        surface
            .pattern()
            .replace_all(content, |caps: &Captures| match surface.split(caps) {
                Some((before, link, after)) if !is_passthrough(link) => {
                    format!("{}{}{}", before, self.rewrite_link(file_path, link), after)
                }
                _ => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Rewrite one link for the output file at `file_path`.
    ///
    /// A leading `../` is dropped, then the leading directories shared by the
    /// file and the link are removed, and one `../` is added per directory the
    /// file still sits in.
    pub fn rewrite_link(&self, file_path: &str, link: &str) -> String {
        let mut link = link.strip_prefix("../").unwrap_or(link);
        let mut file = file_path;

        while let Some(end) = file.find('/') {
            let segment = &file[..=end];
            if !link.starts_with(segment) {
                break;
            }
            link = &link[segment.len()..];
            file = &file[segment.len()..];
        }

        let depth = file.matches('/').count();
        let relative = format!("{}{}", "../".repeat(depth), link);
        self.index.strip(&relative)
    }

    pub fn directory_index(&self) -> &DirectoryIndex {
        &self.index
    }
}
