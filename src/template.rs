//! Template engine and helper table.
//!
//! A [`TemplateEngine`] is created for every build. It owns its own
//! `Handlebars` registry with the helpers, the configured partials, the
//! `content` partial used by masters, and every page master found in
//! `<source>/masters/`. Nothing is shared between builds, so repeated builds
//! in a long-running process never register anything twice.
//!
//! Helpers are registered under their kebab-case name (`get-path`) and a
//! camelCase alias (`getPath`). They read the language, current path and
//! content reference of the page being rendered from the root render data.

use handlebars::{
    BlockContext, Context, Handlebars, Helper, HelperDef, HelperResult, JsonRender, Output,
    RenderContext, RenderError, RenderErrorReason, Renderable, ScopedJson,
};
use lazy_static::lazy_static;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use serde_json::{json, Value as Json};
use std::sync::Arc;

use crate::config::Settings;
use crate::context::SiteContext;
use crate::error::{BuildError, BuildWarning, Diagnostics, WarningKind};
use crate::i18n::I18nProcessor;
use crate::navigation::{menu_item_classes, must_expand, ExpandPolicy, MenuNode};

/// Name of the partial that masters use to insert the rendered body
pub const CONTENT_PARTIAL: &str = "content";
/// Render data key holding the rendered body
pub const CONTENT_KEY: &str = "__content__";

const INCLUDE_DEPTH_KEY: &str = "__includeDepth__";
const MAX_INCLUDE_DEPTH: u64 = 16;
const PLACEHOLDERS: &[&str] = &["title", "shortTitle", "rootUrl", "canonicalUrl", "lang"];

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<([^>]+)>").unwrap();
}

/// Shared, read-only state the helpers resolve against.
#[derive(Debug)]
pub struct HelperState {
    pub settings: Arc<Settings>,
    pub context: Arc<SiteContext>,
    pub i18n: Arc<I18nProcessor>,
    pub diagnostics: Arc<Diagnostics>,
}

impl HelperState {
    /// Language of the page being rendered, or the fallback language.
    fn current_lang(&self, ctx: &Context) -> String {
        ctx.data()
            .get("lang")
            .and_then(Json::as_str)
            .unwrap_or(&self.settings.i18n.fallback_language)
            .to_string()
    }

    /// Content the page being rendered comes from, for warnings.
    fn subject(&self, ctx: &Context) -> String {
        ctx.data()
            .get("reference")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

/// Text produced by a template step, with the error that interrupted it, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Processed {
    pub output: String,
    pub error: Option<String>,
}

fn helper_error(message: impl Into<String>) -> RenderError {
    RenderErrorReason::Other(message.into()).into()
}

fn truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(a) => !a.is_empty(),
        Json::Object(_) => true,
    }
}

fn param_string(h: &Helper<'_>, index: usize) -> Result<String, RenderError> {
    h.param(index)
        .map(|p| p.value().render())
        .ok_or_else(|| helper_error(format!("`{}` expects a parameter at position {}", h.name(), index)))
}

fn param_value<'a>(h: &'a Helper<'_>, index: usize) -> &'a Json {
    h.param(index).map(|p| p.value()).unwrap_or(&Json::Null)
}

fn hash_string(h: &Helper<'_>, key: &str) -> Option<String> {
    h.hash_get(key)
        .map(|v| v.value())
        .filter(|v| truthy(v))
        .map(|v| v.render())
}

fn hash_flag(h: &Helper<'_>, key: &str) -> bool {
    h.hash_get(key).is_some_and(|v| truthy(v.value()))
}

fn menu_children(value: &Json) -> Option<Vec<MenuNode>> {
    match value {
        Json::Array(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

fn render_branch<'reg: 'rc, 'rc>(
    condition: bool,
    h: &Helper<'rc>,
    r: &'reg Handlebars<'reg>,
    ctx: &'rc Context,
    rc: &mut RenderContext<'reg, 'rc>,
    out: &mut dyn Output,
) -> HelperResult {
    let branch = if condition { h.template() } else { h.inverse() };
    match branch {
        Some(template) => template.render(r, ctx, rc, out),
        None => Ok(()),
    }
}

/// `{{i18n "text"}}`
#[derive(Clone)]
struct I18nHelper(Arc<HelperState>);

impl HelperDef for I18nHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let source = param_string(h, 0)?;
        let translated = self.0.i18n.translate_or_warn(
            &source,
            &self.0.current_lang(ctx),
            &self.0.subject(ctx),
            &self.0.diagnostics,
        );
        Ok(ScopedJson::Derived(Json::String(translated)))
    }
}

/// `{{get-path "about.hbs" lang="fr" canonical=true}}`
///
/// Unknown paths are returned unchanged with a warning.
#[derive(Clone)]
struct GetPathHelper(Arc<HelperState>);

impl HelperDef for GetPathHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let path = param_string(h, 0)?;
        let lang = hash_string(h, "lang").unwrap_or_else(|| self.0.current_lang(ctx));
        let context = &self.0.context;

        let resolved = if hash_flag(h, "canonical") {
            context.canonical_url(&path, &lang)
        } else {
            context.output_path(&path, &lang)
        };

        let result = match resolved {
            Some(resolved) => resolved.to_string(),
            None => {
                self.0
                    .diagnostics
                    .warn(BuildWarning::unresolved_path(&path, &lang));
                path
            }
        };
        Ok(ScopedJson::Derived(Json::String(result)))
    }
}

/// `{{get-language-label "fr" style="native|current|short"}}`
///
/// A label missing from the configured table is a render error.
#[derive(Clone)]
struct LanguageLabelHelper(Arc<HelperState>);

impl HelperDef for LanguageLabelHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let requested = param_string(h, 0)?;
        let style = hash_string(h, "style").unwrap_or_else(|| "native".to_string());
        let current = h
            .hash_get("context")
            .and_then(|c| c.value().get("lang"))
            .and_then(Json::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.0.current_lang(ctx));

        let in_language = match style.as_str() {
            "short" => return Ok(ScopedJson::Derived(Json::String(requested))),
            "native" => requested.clone(),
            "current" => current,
            other => return Err(helper_error(format!("Invalid style |{}|", other))),
        };

        self.0
            .settings
            .i18n
            .labels
            .get(&requested)
            .and_then(|labels| labels.get(&in_language))
            .map(|label| ScopedJson::Derived(Json::String(label.clone())))
            .ok_or_else(|| {
                helper_error(format!(
                    "Undefined language in reference array: |{}| (requested in current language: |{}|).",
                    requested, in_language
                ))
            })
    }
}

/// `{{get-title "about.hbs" short=true}}`
///
/// Titles are inserted as markup. An unknown content yields a flagged span.
#[derive(Clone)]
struct GetTitleHelper(Arc<HelperState>);

impl HelperDef for GetTitleHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let path = param_string(h, 0)?;
        let entry = self.0.context.get(&path).filter(|e| !e.title.is_empty());

        match entry {
            Some(entry) if hash_flag(h, "short") => out.write(&entry.short_title)?,
            Some(entry) => out.write(&entry.title)?,
            None => {
                self.0.diagnostics.warn(BuildWarning::missing_title(&path));
                out.write(&format!(
                    "<span class=\"debug error error-no-title-defined\">{}</span>",
                    html_escape::encode_text(&path)
                ))?;
            }
        }
        Ok(())
    }
}

/// `{{get-menu-item-classes @first @last currentPath id children}}`
#[derive(Clone)]
struct MenuItemClassesHelper(Arc<HelperState>);

impl HelperDef for MenuItemClassesHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let current = param_value(h, 2).render();
        let current = self.0.context.source_path_of(&current);
        let item = param_value(h, 3).render();
        let children = menu_children(param_value(h, 4));

        let classes = menu_item_classes(
            truthy(param_value(h, 0)),
            truthy(param_value(h, 1)),
            current,
            &item,
            children.as_deref(),
        );
        if !classes.is_empty() {
            out.write(&format!(" class=\"{}\"", classes.join(" ")))?;
        }
        Ok(())
    }
}

/// `{{#if-must-expand-menu policy children currentPath id}}...{{else}}...{{/if-must-expand-menu}}`
#[derive(Clone)]
struct MustExpandMenuHelper(Arc<HelperState>);

impl HelperDef for MustExpandMenuHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let policy = param_value(h, 0);
        let policy = if truthy(policy) {
            ExpandPolicy::parse(&policy.render())
        } else {
            ExpandPolicy::Always
        };
        let children = menu_children(param_value(h, 1));
        let current = param_value(h, 2).render();
        let current = self.0.context.source_path_of(&current);
        let item = param_value(h, 3).render();

        let expand = must_expand(policy, children.as_deref(), current, &item);
        render_branch(expand, h, r, ctx, rc, out)
    }
}

/// `{{#foreach-language "about.hbs"}}{{lang}} {{path}}{{/foreach-language}}`
///
/// Without a path, iterates the languages of the page being rendered.
#[derive(Clone)]
struct ForeachLanguageHelper(Arc<HelperState>);

impl HelperDef for ForeachLanguageHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let path = match h.param(0) {
            Some(p) => p.value().render(),
            None => self.0.subject(ctx),
        };
        let entry = self.0.context.get(&path).ok_or_else(|| {
            helper_error(format!("Cannot find content definition for content |{}|", path))
        })?;
        let Some(template) = h.template() else {
            return Ok(());
        };

        let count = entry.translation_set.len();
        for (index, (lang, output_path)) in entry.translation_set.iter().enumerate() {
            let first = index == 0;
            let last = index + 1 == count;
            let mut block = BlockContext::new();
            block.set_base_value(json!({
                "lang": lang,
                "path": output_path,
                "first": first,
                "last": last,
            }));
            block.set_local_var("first", Json::Bool(first));
            block.set_local_var("last", Json::Bool(last));
            block.set_local_var("index", json!(index));

            rc.push_block(block);
            let rendered = template.render(r, ctx, rc, out);
            rc.pop_block();
            rendered?;
        }
        Ok(())
    }
}

/// `{{#if-equal a b}}` and `{{#unless-equal a b}}`
#[derive(Clone)]
struct CompareHelper {
    when_equal: bool,
}

impl HelperDef for CompareHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let equal = param_value(h, 0) == param_value(h, 1);
        render_branch(equal == self.when_equal, h, r, ctx, rc, out)
    }
}

/// Raw markup helpers: `passthrough` protects its argument from typography,
/// `json` dumps a value.
#[derive(Clone, Copy)]
enum RawHelper {
    Passthrough,
    Json,
}

impl HelperDef for RawHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let value = param_value(h, 0);
        let text = match self {
            RawHelper::Passthrough => format!("<no-typo>{}</no-typo>", value.render()),
            RawHelper::Json => {
                let dump = serde_json::to_string_pretty(value)
                    .map_err(|e| helper_error(e.to_string()))?;
                format!("<no-typo><pre>{}</pre></no-typo>", html_escape::encode_text(&dump))
            }
        };
        out.write(&text)?;
        Ok(())
    }
}

/// Value helpers: `strip-html` removes tags, `concat` joins its arguments.
#[derive(Clone, Copy)]
enum TextHelper {
    StripHtml,
    Concat,
}

impl HelperDef for TextHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let text = match self {
            TextHelper::StripHtml => HTML_TAG.replace_all(&param_string(h, 0)?, "").into_owned(),
            TextHelper::Concat => h.params().iter().map(|p| p.value().render()).collect(),
        };
        Ok(ScopedJson::Derived(Json::String(text)))
    }
}

/// `{{include-file "partials/banner.hbs" extra="value"}}`
///
/// Paths starting with `/` are relative to the tools root, others to the
/// source root. The hash is merged into `more`. An unreadable file fails the
/// whole build.
#[derive(Clone)]
struct IncludeFileHelper(Arc<HelperState>);

impl HelperDef for IncludeFileHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let file = param_string(h, 0)?;
        let path = self.0.settings.resolve_structural_path(&file);

        let depth = ctx
            .data()
            .get(INCLUDE_DEPTH_KEY)
            .and_then(Json::as_u64)
            .unwrap_or(0);
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(helper_error(format!(
                "Include depth exceeded while including |{}|",
                path.display()
            )));
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                let message = format!("Cannot read include file |{}|", path.display());
                self.0.diagnostics.set_fatal(BuildError::io(&path, e));
                return Err(helper_error(message));
            }
        };

        let mut data = ctx.data().clone();
        if let Json::Object(map) = &mut data {
            map.insert(INCLUDE_DEPTH_KEY.to_string(), json!(depth + 1));
            let more = map
                .entry("more")
                .or_insert_with(|| Json::Object(Default::default()));
            if !more.is_object() {
                *more = Json::Object(Default::default());
            }
            if let Json::Object(more) = more {
                for (key, value) in h.hash() {
                    more.insert(key.to_string(), value.value().clone());
                }
            }
        }

        let file_name = path.to_string_lossy();
        let processed = apply_template_processing(r, &file_name, &content, &data);
        if let Some(error) = processed.error {
            self.0.diagnostics.warn(BuildWarning::new(
                WarningKind::Render,
                "content",
                self.0.subject(ctx),
                format!("Exception when rendering included file |{}|: {}", file_name, error),
            ));
        }
        out.write(&processed.output)?;
        Ok(())
    }
}

/// Convert markdown to HTML. Raw HTML in the source is kept.
pub fn markdown_to_html(source: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut output = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut output, Parser::new_ext(source, options));
    output
}

fn placeholder_value(data: &Json, key: &str) -> String {
    match data.get(key) {
        Some(Json::String(s)) => s.clone(),
        Some(Json::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Render `content`, read from `file`, against `data`.
///
/// `.hbs` files are evaluated as templates and keep the output produced before
/// an evaluation error. `.md` files are converted to HTML. Every other file,
/// and markdown after conversion, only gets the `{{title}}`, `{{shortTitle}}`,
/// `{{rootUrl}}`, `{{canonicalUrl}}` and `{{lang}}` placeholders replaced.
pub fn apply_template_processing(
    registry: &Handlebars<'_>,
    file: &str,
    content: &str,
    data: &Json,
) -> Processed {
    if file.ends_with(".hbs") {
        let mut buffer = Vec::new();
        let result = registry.render_template_to_write(content, data, &mut buffer);
        return Processed {
            output: String::from_utf8_lossy(&buffer).into_owned(),
            error: result.err().map(|e| e.to_string()),
        };
    }

    let mut output = if file.ends_with(".md") {
        markdown_to_html(content)
    } else {
        content.to_string()
    };
    for key in PLACEHOLDERS {
        let placeholder = format!("{{{{{}}}}}", key);
        if output.contains(&placeholder) {
            output = output.replace(&placeholder, &placeholder_value(data, key));
        }
    }
    Processed {
        output,
        error: None,
    }
}

fn master_key(name: &str) -> String {
    format!("masters/{}", name)
}

/// Handlebars registry for one build.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
    state: Arc<HelperState>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("templates", &self.registry.get_templates().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TemplateEngine {
    /// Create the registry: helpers, the `content` partial, configured
    /// partials, then page masters. An unreadable partial or master is fatal;
    /// a master that does not compile is reported and left unregistered.
    pub fn new(state: HelperState) -> Result<Self, BuildError> {
        let state = Arc::new(state);
        let mut registry = Handlebars::new();
        registry.set_prevent_indent(true);

        register_helpers(&mut registry, &state);
        registry
            .register_partial(CONTENT_PARTIAL, "{{{__content__}}}")
            .map_err(|e| BuildError::configuration(e.to_string()))?;

        let mut engine = Self { registry, state };
        engine.register_partials()?;
        engine.register_masters()?;
        Ok(engine)
    }

    fn register_partials(&mut self) -> Result<(), BuildError> {
        for (name, file) in &self.state.settings.content.partials {
            let path = self.state.settings.resolve_structural_path(file);
            let source = std::fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
            self.registry.register_partial(name, source).map_err(|e| {
                BuildError::configuration(format!("Cannot compile partial |{}|: {}", name, e))
            })?;
            log::debug!("Registered partial {} from {}", name, path.display());
        }
        Ok(())
    }

    fn register_masters(&mut self) -> Result<(), BuildError> {
        let dir = self.state.settings.masters_dir();
        if !dir.is_dir() {
            return Ok(());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| BuildError::io(&dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| BuildError::io(&dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "hbs") {
                files.push(path);
            }
        }
        files.sort();

        for path in files {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
            match self.registry.register_template_string(&master_key(&name), source) {
                Ok(()) => log::debug!("Registered master {}", name),
                Err(e) => self.state.diagnostics.warn(BuildWarning::new(
                    WarningKind::Render,
                    "content",
                    path.display().to_string(),
                    format!("Cannot compile master template |{}|: {}", name, e),
                )),
            }
        }
        Ok(())
    }

    pub fn registry(&self) -> &Handlebars<'static> {
        &self.registry
    }

    pub fn state(&self) -> &HelperState {
        &self.state
    }

    pub fn has_master(&self, name: &str) -> bool {
        self.registry.has_template(&master_key(name))
    }

    /// Render the master `name` against `data`, which must hold the rendered body.
    pub fn render_master(&self, name: &str, data: &Json) -> Result<Processed, BuildError> {
        let key = master_key(name);
        if !self.registry.has_template(&key) {
            return Err(BuildError::render(
                data.get("reference").and_then(Json::as_str).unwrap_or_default(),
                format!("Cannot find master template |{}|.", name),
            ));
        }

        let mut buffer = Vec::new();
        let result = self.registry.render_to_write(&key, data, &mut buffer);
        Ok(Processed {
            output: String::from_utf8_lossy(&buffer).into_owned(),
            error: result.err().map(|e| e.to_string()),
        })
    }
}

fn register<H>(registry: &mut Handlebars<'static>, names: &[&str], helper: H)
where
    H: HelperDef + Clone + Send + Sync + 'static,
{
    for name in names {
        registry.register_helper(name, Box::new(helper.clone()));
    }
}

fn register_helpers(registry: &mut Handlebars<'static>, state: &Arc<HelperState>) {
    register(registry, &["i18n"], I18nHelper(state.clone()));
    register(registry, &["get-path", "getPath"], GetPathHelper(state.clone()));
    register(
        registry,
        &["get-language-label", "getLanguageLabel"],
        LanguageLabelHelper(state.clone()),
    );
    register(registry, &["get-title", "getTitle"], GetTitleHelper(state.clone()));
    register(
        registry,
        &["get-menu-item-classes", "getMenuItemClasses"],
        MenuItemClassesHelper(state.clone()),
    );
    register(
        registry,
        &["if-must-expand-menu", "ifMustExpandMenu"],
        MustExpandMenuHelper(state.clone()),
    );
    register(
        registry,
        &["foreach-language", "foreachLanguage"],
        ForeachLanguageHelper(state.clone()),
    );
    register(registry, &["include-file", "includeFile"], IncludeFileHelper(state.clone()));
    register(registry, &["if-equal", "ifEqual"], CompareHelper { when_equal: true });
    register(registry, &["unless-equal", "unlessEqual"], CompareHelper { when_equal: false });
    register(registry, &["passthrough"], RawHelper::Passthrough);
    register(registry, &["json"], RawHelper::Json);
    register(registry, &["strip-html", "stripHtml"], TextHelper::StripHtml);
    register(registry, &["concat"], TextHelper::Concat);
}
