//! Page renderer: turns one render job into a finished page.

use serde::Serialize;
use serde_json::Value as Json;

use crate::config::AppVariables;
use crate::context::ContentEntry;
use crate::demux::RenderJob;
use crate::error::{BuildError, BuildWarning};
use crate::navigation::{compute_submenus, Menus, Submenus};
use crate::template::{apply_template_processing, TemplateEngine, CONTENT_KEY};

/// Everything a page template can see while one job is rendered.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext<'a> {
    /// Output path of the page being rendered
    pub current_path: &'a str,
    pub menus: &'a Menus,
    pub submenus: Submenus,
    #[serde(flatten)]
    pub entry: &'a ContentEntry,
    pub app: AppVariables,
    /// Rendered body, only present while the master is evaluated
    #[serde(rename = "__content__", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Renders jobs against one template engine.
#[derive(Debug)]
pub struct Renderer {
    engine: TemplateEngine,
}

impl Renderer {
    pub fn new(engine: TemplateEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// Build the page context of `job`.
    pub fn page_context<'a>(&'a self, job: &'a RenderJob) -> Result<PageContext<'a>, BuildError> {
        let state = self.engine.state();
        let entry = state
            .context
            .get(&job.output_path)
            .filter(|entry| entry.is_target())
            .ok_or_else(|| BuildError::UnregisteredContent(job.output_path.clone()))?;

        let menus = state.context.menus();
        Ok(PageContext {
            current_path: &job.output_path,
            menus,
            submenus: compute_submenus(menus, &entry.reference),
            entry,
            app: state.settings.app_variables(),
            content: None,
        })
    }

    /// Render `body`, the text of the job's content file, then wrap it in
    /// the content's master if it names one.
    ///
    /// Evaluation errors never fail the job: they are reported as warnings
    /// and the output produced so far is kept. A master that cannot be found
    /// yields an empty page.
    pub fn render_job(&self, job: &RenderJob, body: &str) -> Result<String, BuildError> {
        let page = self.page_context(job)?;
        let master = page.entry.master.clone();
        let mut data = serde_json::to_value(&page)
            .map_err(|e| BuildError::render(&job.source, e.to_string()))?;

        let rendered = apply_template_processing(self.engine.registry(), &job.source, body, &data);
        if let Some(error) = rendered.error {
            self.report(job, None, &error);
        }

        let Some(master) = master else {
            return Ok(rendered.output);
        };
        if let Json::Object(map) = &mut data {
            map.insert(CONTENT_KEY.to_string(), Json::String(rendered.output));
        }

        match self.engine.render_master(&master, &data) {
            Ok(page) => {
                if let Some(error) = page.error {
                    self.report(job, Some(&master), &error);
                }
                Ok(page.output)
            }
            Err(e) => {
                self.engine
                    .state()
                    .diagnostics
                    .warn(BuildWarning::render_failure(&e));
                Ok(String::new())
            }
        }
    }

    fn report(&self, job: &RenderJob, master: Option<&str>, error: &str) {
        let message = match master {
            Some(master) => format!(
                "Exception when rendering lang |{}| with master |{}|: {}",
                job.lang, master, error
            ),
            None => format!("Exception when rendering lang |{}|: {}", job.lang, error),
        };
        self.engine
            .state()
            .diagnostics
            .warn(BuildWarning::render_failure(&BuildError::render(&job.source, message)));
    }
}
