//! Long-lived build session.
//!
//! A session keeps the site context of its last successful build. Any change
//! that can affect the context triggers a full rebuild; the new context then
//! replaces the old one in a single swap.

use anyhow::Result;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::{BuildStats, SiteBuilder};
use crate::context::SiteContext;
use crate::matching::{normalize_path, InputMatcher};

pub struct BuildSession {
    builder: SiteBuilder,
    context: RwLock<Option<Arc<SiteContext>>>,
    extra_watch: Option<InputMatcher>,
}

impl BuildSession {
    pub fn new(builder: SiteBuilder) -> Result<Self> {
        let patterns = &builder.settings().content.watch_more;
        let extra_watch = if patterns.is_empty() {
            None
        } else {
            Some(InputMatcher::new(patterns)?)
        };

        Ok(Self {
            builder,
            context: RwLock::new(None),
            extra_watch,
        })
    }

    pub fn builder(&self) -> &SiteBuilder {
        &self.builder
    }

    /// Context of the last successful build.
    pub fn context(&self) -> Option<Arc<SiteContext>> {
        self.context.read().clone()
    }

    fn structural_files(&self) -> Vec<PathBuf> {
        let settings = self.builder.settings();
        let mut files: Vec<PathBuf> = settings
            .content
            .partials
            .values()
            .map(|p| settings.resolve_structural_path(p))
            .collect();
        files.push(settings.paths.config_file.clone());
        files.extend(settings.translations_file());
        if let Some(license) = &settings.license_template_file {
            files.push(settings.paths.source_root.join(license));
        }
        files
    }

    /// Whether a change to `path` requires a rebuild: contents, masters,
    /// partials, translations, licence, the configuration file, or anything
    /// matched by `watchMore` (relative to the project root).
    pub fn is_context_trigger(&self, path: &Path) -> bool {
        let settings = self.builder.settings();
        if path.starts_with(settings.contents_dir()) || path.starts_with(settings.masters_dir()) {
            return true;
        }
        if self.structural_files().iter().any(|file| file == path) {
            return true;
        }
        match (&self.extra_watch, path.strip_prefix(&settings.paths.root)) {
            (Some(matcher), Ok(relative)) => matcher.is_match(&normalize_path(relative)),
            _ => false,
        }
    }

    /// Rebuild everything. The stored context is only replaced when the build succeeds.
    pub async fn rebuild(&self) -> Result<BuildStats> {
        let site = self.builder.render_site()?;
        let stats = self.builder.write_site(&site).await?;
        *self.context.write() = Some(site.context.clone());
        Ok(stats)
    }

    /// Rebuild if `changed` contains a trigger. Returns `None` when nothing had to be done.
    pub async fn on_change(&self, changed: &[PathBuf]) -> Result<Option<BuildStats>> {
        match changed.iter().find(|path| self.is_context_trigger(path)) {
            Some(trigger) => {
                log::info!("{} changed, rebuilding", trigger.display());
                self.rebuild().await.map(Some)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::fs;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> BuildSession {
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("src/contents")).unwrap();
        fs::write(root.join("src/contents/index.hbs"), "<p>one</p>").unwrap();
        let settings = Settings::from_yaml_str(
            "appName: t\nappVersion: 1.0.0\ni18n:\n  source: i18n.csv\ncontent:\n  watchMore: ['assets/*.json']\n",
            &root,
        )
        .unwrap();
        BuildSession::new(SiteBuilder::new(settings)).unwrap()
    }

    #[test]
    fn test_triggers() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let root = dir.path().canonicalize().unwrap();

        assert!(session.is_context_trigger(&root.join("src/contents/new.md")));
        assert!(session.is_context_trigger(&root.join("src/masters/page.hbs")));
        assert!(session.is_context_trigger(&root.join("i18n.csv")));
        assert!(session.is_context_trigger(&root.join("webgen.yaml")));
        assert!(session.is_context_trigger(&root.join("assets/data.json")));
        assert!(!session.is_context_trigger(&root.join("assets/logo.png")));
        assert!(!session.is_context_trigger(&root.join("build-dev/index.html")));
    }

    #[tokio::test]
    async fn test_rebuild_swaps_context() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let root = dir.path().canonicalize().unwrap();
        assert!(session.context().is_none());

        session.rebuild().await.unwrap();
        let first = session.context().unwrap();
        assert!(first.get("about.html").is_none());

        fs::write(root.join("src/contents/about.hbs"), "<p>two</p>").unwrap();
        let stats = session
            .on_change(&[root.join("src/contents/about.hbs")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.pages_written, 2);

        let second = session.context().unwrap();
        assert!(second.get("about.html").is_some());
        // the previous context is untouched
        assert!(first.get("about.html").is_none());

        assert!(session.on_change(&[root.join("README.md")]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_context() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let root = dir.path().canonicalize().unwrap();
        session.rebuild().await.unwrap();

        fs::write(
            root.join("src/contents/bad.hbs"),
            "<!-- start-content-config\npath: relative.html\nend-content-config -->",
        )
        .unwrap();
        assert!(session.rebuild().await.is_err());
        assert_eq!(session.context().unwrap().len(), 2);
    }
}
