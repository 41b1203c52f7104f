//! Named extension points of the build pipeline.
//!
//! Each stage of a build works on an in-memory batch of [`OutputFile`]s.
//! Registered [`Hook`]s run before and after the stages listed in
//! [`HookPoint`] and may edit, add or drop records of the batch.

use std::fmt;
use std::sync::Arc;

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeDemuxPaths,
    AfterDemuxPaths,
    BeforeApplyTemplate,
    AfterApplyTemplate,
    BeforeHtmlRender,
    AfterHtmlRender,
    BeforeI18nProcessing,
    AfterI18nProcessing,
    BeforeTypoCorrection,
    AfterTypoCorrection,
    BeforeContentPathsCorrection,
    AfterContentPathsCorrection,
    BeforeCssPathsCorrection,
    AfterCssPathsCorrection,
    BeforeXmlSitemapGeneration,
    AfterXmlSitemapGeneration,
}

impl HookPoint {
    pub const ALL: [HookPoint; 16] = [
        HookPoint::BeforeDemuxPaths,
        HookPoint::AfterDemuxPaths,
        HookPoint::BeforeApplyTemplate,
        HookPoint::AfterApplyTemplate,
        HookPoint::BeforeHtmlRender,
        HookPoint::AfterHtmlRender,
        HookPoint::BeforeI18nProcessing,
        HookPoint::AfterI18nProcessing,
        HookPoint::BeforeTypoCorrection,
        HookPoint::AfterTypoCorrection,
        HookPoint::BeforeContentPathsCorrection,
        HookPoint::AfterContentPathsCorrection,
        HookPoint::BeforeCssPathsCorrection,
        HookPoint::AfterCssPathsCorrection,
        HookPoint::BeforeXmlSitemapGeneration,
        HookPoint::AfterXmlSitemapGeneration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HookPoint::BeforeDemuxPaths => "beforeDemuxPaths",
            HookPoint::AfterDemuxPaths => "afterDemuxPaths",
            HookPoint::BeforeApplyTemplate => "beforeApplyTemplate",
            HookPoint::AfterApplyTemplate => "afterApplyTemplate",
            HookPoint::BeforeHtmlRender => "beforeHtmlRender",
            HookPoint::AfterHtmlRender => "afterHtmlRender",
            HookPoint::BeforeI18nProcessing => "beforeI18nProcessing",
            HookPoint::AfterI18nProcessing => "afterI18nProcessing",
            HookPoint::BeforeTypoCorrection => "beforeTypoCorrection",
            HookPoint::AfterTypoCorrection => "afterTypoCorrection",
            HookPoint::BeforeContentPathsCorrection => "beforeContentPathsCorrection",
            HookPoint::AfterContentPathsCorrection => "afterContentPathsCorrection",
            HookPoint::BeforeCssPathsCorrection => "beforeCssPathsCorrection",
            HookPoint::AfterCssPathsCorrection => "afterCssPathsCorrection",
            HookPoint::BeforeXmlSitemapGeneration => "beforeXmlSitemapGeneration",
            HookPoint::AfterXmlSitemapGeneration => "afterXmlSitemapGeneration",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One record of a stage batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Source path of the content this record comes from
    pub source: String,
    /// Path relative to the build directory, or the source path before demux
    pub relative_path: String,
    /// Set once the record has been split per language
    pub lang: Option<String>,
    pub contents: String,
}

impl OutputFile {
    pub fn new(source: impl Into<String>, relative_path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            relative_path: relative_path.into(),
            lang: None,
            contents: contents.into(),
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }
}

pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    /// Called at every hook point. Hooks ignore the points they do not handle.
    fn run(&self, point: HookPoint, files: &mut Vec<OutputFile>) -> Result<(), BuildError>;
}

/// Registered hooks, run in registration order.
#[derive(Clone, Default)]
pub struct HookRunner {
    hooks: Vec<Arc<dyn Hook>>,
}

impl fmt::Debug for HookRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name().to_string()))
            .finish()
    }
}

impl HookRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        log::debug!("Registered hook {}", hook.name());
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn run(&self, point: HookPoint, files: &mut Vec<OutputFile>) -> Result<(), BuildError> {
        for hook in &self.hooks {
            log::debug!("Running hook {} at {} on {} files", hook.name(), point, files.len());
            hook.run(point, files)?;
        }
        Ok(())
    }
}
