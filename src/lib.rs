//! Webgen
//!
//! A configuration-driven static website generator: multilingual contents
//! with inline metadata, Handlebars masters and helpers, declarative menus,
//! relative link correction and XML sitemaps.

pub mod builder;
pub mod config;
pub mod context;
pub mod demux;
pub mod descriptor;
pub mod error;
pub mod hooks;
pub mod html_replace;
pub mod i18n;
pub mod license;
pub mod links;
pub mod matching;
pub mod navigation;
pub mod renderer;
pub mod session;
pub mod sitemap;
pub mod template;
pub mod typography;

pub use builder::{BuildStats, CheckReport, RenderedSite, SiteBuilder};
pub use config::{find_config_file, Settings};
pub use context::{ContentEntry, SiteContext, SiteContextBuilder};
pub use demux::{demux, RenderJob};
pub use descriptor::{ContentDescriptor, DescriptorParser};
pub use error::{BuildError, BuildWarning, Diagnostics, WarningKind};
pub use hooks::{Hook, HookPoint, HookRunner, OutputFile};
pub use html_replace::HtmlReplace;
pub use i18n::{Extraction, I18nProcessor, TranslationLookup, Translations};
pub use links::{DirectoryIndex, LinkRewriter, LinkSurface};
pub use navigation::{MenuNode, Menus};
pub use renderer::{PageContext, Renderer};
pub use session::BuildSession;
pub use sitemap::XmlSitemap;
pub use template::TemplateEngine;
pub use typography::{DefaultTypography, TypographyProcessor};
