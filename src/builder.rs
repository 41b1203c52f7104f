use anyhow::{Context, Result};
use indexmap::IndexSet;
use log::{debug, info};
use rayon::prelude::*;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::context::{SiteContext, SiteContextBuilder};
use crate::demux::{demux, RenderJob};
use crate::descriptor::{ContentDescriptor, DescriptorParser};
use crate::error::{BuildError, BuildWarning, Diagnostics, WarningKind};
use crate::hooks::{Hook, HookPoint, HookRunner, OutputFile};
use crate::html_replace::HtmlReplace;
use crate::i18n::{Extraction, I18nProcessor, TranslationLookup, Translations};
use crate::license::LicenseHeader;
use crate::links::{DirectoryIndex, LinkRewriter, LinkSurface};
use crate::matching::{normalize_path, InputMatcher};
use crate::renderer::Renderer;
use crate::sitemap::{XmlSitemap, SITEMAP_FILE};
use crate::template::{HelperState, TemplateEngine};
use crate::typography::{DefaultTypography, TypographyProcessor};

#[derive(Debug, Clone)]
pub struct BuildStats {
    pub contents_processed: usize,
    pub files_skipped: usize,
    pub pages_written: usize,
    pub sitemap_urls: usize,
    pub bytes_written: u64,
    pub build_time: Duration,
    pub warnings: usize,
    pub warning_details: Vec<BuildWarning>,
}

/// A content file read from disk and parsed.
#[derive(Debug, Clone)]
pub struct SourceContent {
    pub descriptor: ContentDescriptor,
    pub text: String,
}

/// Everything a build produces, before it is written.
#[derive(Debug)]
pub struct RenderedSite {
    pub context: Arc<SiteContext>,
    pub pages: Vec<OutputFile>,
    pub sitemap: Option<OutputFile>,
    pub contents_processed: usize,
    pub files_skipped: usize,
    started: Instant,
}

/// Result of a dry run.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub contents: usize,
    pub context_entries: usize,
    pub menus: usize,
    pub warnings: Vec<BuildWarning>,
}

pub struct SiteBuilder {
    settings: Arc<Settings>,
    parallel_jobs: usize,
    hooks: HookRunner,
    typography: Arc<dyn TypographyProcessor>,
    translations: Option<Arc<dyn TranslationLookup>>,
    diagnostics: Arc<Diagnostics>,
}

impl SiteBuilder {
    pub fn new(settings: Settings) -> Self {
        let parallel_jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            settings: Arc::new(settings),
            parallel_jobs,
            hooks: HookRunner::new(),
            typography: Arc::new(DefaultTypography),
            translations: None,
            diagnostics: Arc::new(Diagnostics::new()),
        }
    }

    pub fn set_parallel_jobs(&mut self, jobs: usize) {
        if jobs > 0 {
            self.parallel_jobs = jobs;
        }
    }

    pub fn add_hook(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.register(hook);
    }

    pub fn set_typography(&mut self, typography: Arc<dyn TypographyProcessor>) {
        self.typography = typography;
    }

    /// Use `lookup` instead of the translation file named in the settings.
    pub fn set_translations(&mut self, lookup: Arc<dyn TranslationLookup>) {
        self.translations = Some(lookup);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_jobs)
            .build()
            .context("Failed to create worker pool")
    }

    /// Content files selected by the input patterns, relative to the contents directory.
    ///
    /// Files in subdirectories whose name matches are kept too, so that the
    /// parser can reject them instead of silently ignoring them.
    fn discover_contents(&self) -> Result<Vec<String>> {
        let contents_dir = self.settings.contents_dir();
        let matcher = InputMatcher::new(&self.settings.content.input)?;
        let everything = InputMatcher::new(&["**".to_string()])?;

        let files = everything
            .matching_files(&contents_dir)?
            .into_iter()
            .map(|path| normalize_path(&path))
            .filter(|relative| {
                matcher.is_match(relative)
                    || relative
                        .rsplit('/')
                        .next()
                        .is_some_and(|name| name != relative && matcher.is_match(name))
            })
            .collect();
        Ok(files)
    }

    /// Read and parse every content file. Unreadable files are skipped with a
    /// warning; a malformed descriptor fails the build.
    fn load_contents(&self, pool: &rayon::ThreadPool) -> Result<(Vec<SourceContent>, usize)> {
        let files = self.discover_contents()?;
        info!("Discovered {} content files", files.len());

        let contents_dir = self.settings.contents_dir();
        let parser = DescriptorParser::new(self.settings.i18n.fallback_language.clone());

        let results: Vec<Result<Option<SourceContent>, BuildError>> = pool.install(|| {
            files
                .par_iter()
                .map(|relative| {
                    let path = contents_dir.join(relative);
                    let text = match std::fs::read_to_string(&path) {
                        Ok(text) => text,
                        Err(e) => {
                            self.diagnostics.warn(BuildWarning::new(
                                WarningKind::Content,
                                "content",
                                relative.as_str(),
                                format!("Skipping unreadable file: {}", e),
                            ));
                            return Ok(None);
                        }
                    };
                    let descriptor = parser.parse(relative, &text)?;
                    debug!("Parsed {} ({} languages)", relative, descriptor.translation_set.len());
                    Ok(Some(SourceContent { descriptor, text }))
                })
                .collect()
        });

        let mut contents = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for result in results {
            match result? {
                Some(content) => contents.push(content),
                None => skipped += 1,
            }
        }
        Ok((contents, skipped))
    }

    fn build_context(&self, contents: &[SourceContent]) -> Result<SiteContext> {
        let mut builder = SiteContextBuilder::new(&self.settings)?;
        for content in contents {
            builder.add(&content.descriptor);
        }
        let context = builder.build();
        info!(
            "Built site context: {} entries, {} menus",
            context.len(),
            context.menus().len()
        );
        Ok(context)
    }

    fn translation_lookup(&self) -> Result<Arc<dyn TranslationLookup>> {
        let fallback = &self.settings.i18n.fallback_language;
        let lookup: Arc<dyn TranslationLookup> = match (&self.translations, self.settings.translations_file()) {
            (Some(lookup), _) => lookup.clone(),
            (None, Some(path)) => Arc::new(Translations::load(&path, fallback, &self.diagnostics)?),
            (None, None) => Arc::new(Translations::empty()),
        };
        Ok(lookup)
    }

    fn i18n_processor(&self, context: &SiteContext) -> Result<I18nProcessor> {
        let fallback = &self.settings.i18n.fallback_language;
        let lookup = self.translation_lookup()?;

        let mut languages: IndexSet<String> = self.settings.i18n.labels.keys().cloned().collect();
        for (_, entry) in context.entries() {
            languages.extend(entry.translation_set.keys().cloned());
        }

        Ok(I18nProcessor::new(
            lookup,
            fallback.clone(),
            languages,
            self.settings.is_release(),
        )?)
    }

    fn template_engine(&self, context: Arc<SiteContext>, i18n: Arc<I18nProcessor>) -> Result<TemplateEngine> {
        Ok(TemplateEngine::new(HelperState {
            settings: self.settings.clone(),
            context,
            i18n,
            diagnostics: self.diagnostics.clone(),
        })?)
    }

    /// Run `hooks(before)`, `transform` on every record in parallel, then `hooks(after)`.
    fn run_stage<F>(
        &self,
        pool: &rayon::ThreadPool,
        (before, after): (HookPoint, HookPoint),
        mut files: Vec<OutputFile>,
        transform: F,
    ) -> Result<Vec<OutputFile>>
    where
        F: Fn(OutputFile) -> OutputFile + Send + Sync,
    {
        self.hooks.run(before, &mut files)?;
        let mut files: Vec<OutputFile> = pool.install(|| files.into_par_iter().map(transform).collect());
        self.hooks.run(after, &mut files)?;
        Ok(files)
    }

    fn demux_stage(&self, context: &SiteContext, contents: &[SourceContent]) -> Result<Vec<OutputFile>> {
        let mut sources: Vec<OutputFile> = contents
            .iter()
            .map(|c| {
                let path = &c.descriptor.original_path;
                OutputFile::new(path.as_str(), path.as_str(), c.text.as_str())
            })
            .collect();
        self.hooks.run(HookPoint::BeforeDemuxPaths, &mut sources)?;

        let mut jobs = Vec::new();
        for source in sources {
            match demux(&source.source, context) {
                Ok(split) => jobs.extend(split.into_iter().map(|job| {
                    OutputFile::new(job.source, job.output_path, source.contents.as_str()).with_lang(job.lang)
                })),
                Err(e) => self.diagnostics.warn(BuildWarning::render_failure(&e)),
            }
        }

        self.hooks.run(HookPoint::AfterDemuxPaths, &mut jobs)?;
        debug!("Split {} contents into {} render jobs", contents.len(), jobs.len());
        Ok(jobs)
    }

    fn sitemap_file(&self, context: &SiteContext, license: Option<&LicenseHeader>) -> Result<Option<OutputFile>> {
        let Some(defaults) = self.settings.content.xmlsitemap.defaults() else {
            return Ok(None);
        };

        let mut batch = vec![OutputFile::new(SITEMAP_FILE, SITEMAP_FILE, "")];
        self.hooks.run(HookPoint::BeforeXmlSitemapGeneration, &mut batch)?;
        let sitemap = XmlSitemap::from_context(context, &defaults);
        for file in &mut batch {
            file.contents = sitemap.to_xml();
        }
        self.hooks.run(HookPoint::AfterXmlSitemapGeneration, &mut batch)?;

        let Some(mut file) = batch.into_iter().next() else {
            return Ok(None);
        };
        if let Some(license) = license {
            file.contents = license.apply(&file.relative_path, &file.contents)?;
        }
        info!("Generated XML sitemap with {} URLs", sitemap.len());
        Ok(Some(file))
    }

    fn license(&self) -> Result<Option<LicenseHeader>> {
        if !self.settings.is_release() {
            return Ok(None);
        }
        Ok(LicenseHeader::from_settings(&self.settings)?)
    }

    /// Run every stage of a build in memory.
    pub fn render_site(&self) -> Result<RenderedSite> {
        let started = Instant::now();
        self.diagnostics.clear();
        let pool = self.thread_pool()?;

        let (contents, files_skipped) = self.load_contents(&pool)?;
        let context = Arc::new(self.build_context(&contents)?);

        let i18n = Arc::new(self.i18n_processor(&context)?);
        let renderer = Renderer::new(self.template_engine(context.clone(), i18n.clone())?);
        let rewriter = LinkRewriter::new(DirectoryIndex::new(
            self.settings.content.directory_index_pattern.as_deref(),
        )?);
        let html_replace = HtmlReplace::new(&self.settings.html_replace_sets());
        let license = self.license()?;
        let fallback = self.settings.i18n.fallback_language.as_str();

        let jobs = self.demux_stage(&context, &contents)?;

        let mut pages = self.run_stage(
            &pool,
            (HookPoint::BeforeApplyTemplate, HookPoint::AfterApplyTemplate),
            jobs,
            |mut file| {
                let job = RenderJob {
                    source: file.source.clone(),
                    lang: file.lang.clone().unwrap_or_else(|| fallback.to_string()),
                    output_path: file.relative_path.clone(),
                };
                file.contents = renderer.render_job(&job, &file.contents).unwrap_or_else(|e| {
                    self.diagnostics.warn(BuildWarning::render_failure(&e));
                    String::new()
                });
                file
            },
        )?;
        info!("Rendered {} pages", pages.len());

        self.hooks.run(HookPoint::BeforeHtmlRender, &mut pages)?;

        let pages = self.run_stage(
            &pool,
            (HookPoint::BeforeI18nProcessing, HookPoint::AfterI18nProcessing),
            pages,
            |mut file| {
                let lang = file.lang.as_deref().unwrap_or(fallback);
                file.contents = i18n.process(&file.contents, lang, &file.source, &self.diagnostics);
                file
            },
        )?;

        let pages = self.run_stage(
            &pool,
            (HookPoint::BeforeTypoCorrection, HookPoint::AfterTypoCorrection),
            pages,
            |mut file| {
                let lang = file.lang.as_deref().unwrap_or(fallback);
                file.contents = self.typography.process(&file.contents, lang);
                file
            },
        )?;

        let pages: Vec<OutputFile> = pool.install(|| {
            pages
                .into_par_iter()
                .map(|mut file| {
                    file.contents = html_replace.apply(&file.contents);
                    file
                })
                .collect()
        });

        let pages = self.run_stage(
            &pool,
            (HookPoint::BeforeContentPathsCorrection, HookPoint::AfterContentPathsCorrection),
            pages,
            |mut file| {
                file.contents = rewriter.rewrite(LinkSurface::Markup, &file.relative_path, &file.contents);
                file
            },
        )?;

        let mut pages = self.run_stage(
            &pool,
            (HookPoint::BeforeCssPathsCorrection, HookPoint::AfterCssPathsCorrection),
            pages,
            |mut file| {
                file.contents = rewriter.rewrite(LinkSurface::Css, &file.relative_path, &file.contents);
                file
            },
        )?;
        self.hooks.run(HookPoint::AfterHtmlRender, &mut pages)?;

        if let Some(license) = &license {
            for page in &mut pages {
                page.contents = license.apply(&page.relative_path, &page.contents)?;
            }
        }

        if let Some(fatal) = self.diagnostics.take_fatal() {
            return Err(fatal).context("Build aborted");
        }

        let sitemap = self.sitemap_file(&context, license.as_ref())?;

        Ok(RenderedSite {
            context,
            pages,
            sitemap,
            contents_processed: contents.len(),
            files_skipped,
            started,
        })
    }

    async fn write_file(&self, build_path: &Path, file: &OutputFile) -> Result<Option<u64>> {
        let relative = Path::new(&file.relative_path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            self.diagnostics.warn(BuildWarning::new(
                WarningKind::Content,
                "content",
                file.source.as_str(),
                format!("Refusing to write outside the build directory: |{}|", file.relative_path),
            ));
            return Ok(None);
        }

        let path = build_path.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        tokio::fs::write(&path, file.contents.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {}", path.display());
        Ok(Some(file.contents.len() as u64))
    }

    /// Write a rendered site to the build directory.
    pub async fn write_site(&self, site: &RenderedSite) -> Result<BuildStats> {
        let build_path = self.settings.build_path();
        tokio::fs::create_dir_all(build_path)
            .await
            .with_context(|| format!("Failed to create output directory: {}", build_path.display()))?;

        let mut pages_written = 0;
        let mut bytes_written = 0;
        for page in &site.pages {
            if let Some(bytes) = self.write_file(build_path, page).await? {
                pages_written += 1;
                bytes_written += bytes;
            }
        }
        if let Some(sitemap) = &site.sitemap {
            if let Some(bytes) = self.write_file(build_path, sitemap).await? {
                bytes_written += bytes;
            }
        }

        let warning_details = self.diagnostics.warnings();
        let build_time = site.started.elapsed();
        info!(
            "Build completed in {:?}: {} pages in {}",
            build_time,
            pages_written,
            build_path.display()
        );

        Ok(BuildStats {
            contents_processed: site.contents_processed,
            files_skipped: site.files_skipped,
            pages_written,
            sitemap_urls: site
                .sitemap
                .as_ref()
                .map(|s| s.contents.matches("<url>").count())
                .unwrap_or(0),
            bytes_written,
            build_time,
            warnings: warning_details.len(),
            warning_details,
        })
    }

    pub async fn build(&self) -> Result<BuildStats> {
        info!(
            "Starting {} build of {} {}",
            if self.settings.is_release() { "release" } else { "development" },
            self.settings.app_name,
            self.settings.app_version
        );
        let site = self.render_site()?;
        self.write_site(&site).await
    }

    /// Parse every content, build the context and load the templates without writing anything.
    pub fn check(&self) -> Result<CheckReport> {
        self.diagnostics.clear();
        let pool = self.thread_pool()?;
        let (contents, _) = self.load_contents(&pool)?;
        let context = Arc::new(self.build_context(&contents)?);
        let i18n = Arc::new(self.i18n_processor(&context)?);
        self.template_engine(context.clone(), i18n)?;

        Ok(CheckReport {
            contents: contents.len(),
            context_entries: context.len(),
            menus: context.menus().len(),
            warnings: self.diagnostics.warnings(),
        })
    }

    /// Generate only the XML sitemap.
    pub async fn write_sitemap(&self) -> Result<Option<PathBuf>> {
        self.diagnostics.clear();
        let pool = self.thread_pool()?;
        let (contents, _) = self.load_contents(&pool)?;
        let context = self.build_context(&contents)?;
        let license = self.license()?;

        let Some(sitemap) = self.sitemap_file(&context, license.as_ref())? else {
            info!("XML sitemap is disabled");
            return Ok(None);
        };
        let build_path = self.settings.build_path();
        self.write_file(build_path, &sitemap).await?;
        Ok(Some(build_path.join(&sitemap.relative_path)))
    }

    /// Collect the translatable strings of masters, partials and contents and
    /// rewrite the translation table, keeping the translations it already has.
    pub async fn extract_i18n(&self) -> Result<(PathBuf, usize)> {
        self.diagnostics.clear();
        let Some(target) = self.settings.translations_file() else {
            return Err(BuildError::configuration("No translation source file.").into());
        };
        let source_root = &self.settings.paths.source_root;

        let mut sources: Vec<PathBuf> = InputMatcher::new(&["*.hbs".to_string()])?
            .matching_files(&self.settings.masters_dir())?
            .into_iter()
            .map(|path| self.settings.masters_dir().join(path))
            .collect();
        sources.extend(
            self.settings
                .content
                .partials
                .values()
                .map(|p| self.settings.resolve_structural_path(p)),
        );
        let contents_dir = self.settings.contents_dir();
        sources.extend(self.discover_contents()?.into_iter().map(|p| contents_dir.join(p)));

        let mut extraction = Extraction::new();
        for path in &sources {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let label = path
                .strip_prefix(source_root)
                .map(normalize_path)
                .unwrap_or_else(|_| path.display().to_string());
            extraction.scan(&label, &text);
        }

        let fallback = &self.settings.i18n.fallback_language;
        let mut languages: IndexSet<String> = IndexSet::new();
        languages.insert(fallback.clone());
        languages.extend(self.settings.i18n.labels.keys().cloned());
        let languages: Vec<String> = languages.into_iter().collect();

        let existing = self.translation_lookup()?;
        let mut table = Vec::new();
        extraction
            .write_csv(&mut table, existing.as_ref(), &languages, fallback)
            .context("Failed to write the translation table")?;
        tokio::fs::write(&target, table)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;

        info!(
            "Extracted {} translatable strings from {} files into {}",
            extraction.len(),
            sources.len(),
            target.display()
        );
        Ok((target, extraction.len()))
    }

    /// Remove the development and release build directories.
    pub async fn clean(&self) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for path in self.settings.all_build_paths() {
            if path.exists() {
                tokio::fs::remove_dir_all(&path)
                    .await
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                info!("Removed {}", path.display());
                removed.push(path);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site(files: &[(&str, &str)]) -> (TempDir, SiteBuilder) {
        let dir = TempDir::new().unwrap();
        for (path, text) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        let config = files
            .iter()
            .find(|(path, _)| *path == "webgen.yaml")
            .map(|(_, text)| *text)
            .unwrap_or("appName: t\nappVersion: 1.0.0\n");
        let settings = Settings::from_yaml_str(config, dir.path()).unwrap();
        let mut builder = SiteBuilder::new(settings);
        builder.set_parallel_jobs(2);
        (dir, builder)
    }

    #[test]
    fn test_discovery_keeps_nested_candidates() {
        let (_dir, builder) = site(&[
            ("src/contents/index.hbs", ""),
            ("src/contents/style.css", ""),
            ("src/contents/sub/page.md", ""),
        ]);
        let files = builder.discover_contents().unwrap();
        assert_eq!(files, vec!["index.hbs", "sub/page.md"]);
    }

    #[test]
    fn test_nested_content_is_fatal() {
        let (_dir, builder) = site(&[("src/contents/sub/page.md", "# hi")]);
        let err = builder.render_site().unwrap_err();
        let cause = err.downcast_ref::<BuildError>().unwrap();
        assert!(matches!(cause, BuildError::Configuration(_)));
    }

    #[test]
    fn test_stages_apply_in_order() {
        let (_dir, builder) = site(&[
            (
                "src/contents/docs.hbs",
                "<!-- start-content-config\npath: /guide/docs.html\nend-content-config -->\n<p><a href=\"guide/img/a.png\">{i18n See 3 pictures}</a></p>",
            ),
        ]);
        let rendered = builder.render_site().unwrap();
        assert_eq!(rendered.pages.len(), 1);
        let page = &rendered.pages[0];
        assert_eq!(page.relative_path, "guide/docs.html");
        assert!(page.contents.contains("href=\"img/a.png\""));
        assert!(page.contents.contains("See 3&nbsp;pictures"));
        assert!(page.contents.contains("i18n-missing-translation"));
        assert!(rendered.sitemap.is_some());
    }

    #[derive(Default)]
    struct Recorder {
        seen: parking_lot::Mutex<Vec<HookPoint>>,
    }

    impl Hook for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn run(&self, point: HookPoint, _: &mut Vec<OutputFile>) -> Result<(), BuildError> {
            self.seen.lock().push(point);
            Ok(())
        }
    }

    #[test]
    fn test_hook_points_fire_in_pipeline_order() {
        let (_dir, mut builder) = site(&[("src/contents/index.hbs", "<p>x</p>")]);
        let recorder = Arc::new(Recorder::default());
        builder.add_hook(recorder.clone());
        builder.render_site().unwrap();

        use HookPoint::*;
        assert_eq!(
            *recorder.seen.lock(),
            vec![
                BeforeDemuxPaths,
                AfterDemuxPaths,
                BeforeApplyTemplate,
                AfterApplyTemplate,
                BeforeHtmlRender,
                BeforeI18nProcessing,
                AfterI18nProcessing,
                BeforeTypoCorrection,
                AfterTypoCorrection,
                BeforeContentPathsCorrection,
                AfterContentPathsCorrection,
                BeforeCssPathsCorrection,
                AfterCssPathsCorrection,
                AfterHtmlRender,
                BeforeXmlSitemapGeneration,
                AfterXmlSitemapGeneration,
            ]
        );
    }

    #[test]
    fn test_build_blocks_point_at_bundles() {
        let (_dir, builder) = site(&[
            (
                "webgen.yaml",
                "appName: t\nappVersion: 1.0.0\nstyles:\n  sets:\n    css/main.css: [less/main.less]\n",
            ),
            (
                "src/contents/docs.hbs",
                "<!-- start-content-config\npath: /guide/docs.html\nend-content-config -->\n<!-- build:css/main.css --><link href=\"less/main.css\" rel=\"stylesheet\"><!-- endbuild -->",
            ),
        ]);
        let suffix = builder.settings().target.build_assets_suffix.clone();
        let rendered = builder.render_site().unwrap();
        let page = &rendered.pages[0].contents;

        assert!(page.contains(&format!("<link href=\"../css/main{}.css\" rel=\"stylesheet\" />", suffix)));
        assert!(!page.contains("less/main.css"));
    }

    #[test]
    fn test_check_does_not_write() {
        let (dir, builder) = site(&[("src/contents/index.hbs", "<p>x</p>")]);
        let report = builder.check().unwrap();
        assert_eq!(report.contents, 1);
        assert_eq!(report.context_entries, 2);
        assert!(!dir.path().join("build-dev").exists());
    }
}
