//! Licence header for release builds.

use handlebars::Handlebars;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;

use crate::config::{AppVariables, Settings};
use crate::error::BuildError;

lazy_static! {
    static ref PROLOG: Regex = Regex::new(r"(<!DOCTYPE[^>]+>|<\?xml.+?\?>)").unwrap();
}

const TEMPLATE_NAME: &str = "license";

/// Compiled licence template, prepended as a comment to HTML and XML files.
pub struct LicenseHeader {
    registry: Handlebars<'static>,
    app: AppVariables,
}

impl std::fmt::Debug for LicenseHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseHeader").field("app", &self.app.app_name).finish()
    }
}

impl LicenseHeader {
    /// Header for the configured licence text, if any.
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>, BuildError> {
        settings
            .license_text
            .as_deref()
            .map(|text| Self::new(text, settings.app_variables()))
            .transpose()
    }

    /// Every line of `text` is prefixed with ` * ` inside a `<!-- -->` comment.
    /// The text may use `{{app.*}}` and `{{file}}`.
    pub fn new(text: &str, app: AppVariables) -> Result<Self, BuildError> {
        let body = text
            .lines()
            .map(|line| format!(" * {}", line))
            .collect::<Vec<_>>()
            .join("\n");
        let template = format!("<!--\n{}\n-->", body);

        let mut registry = Handlebars::new();
        registry
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|e| BuildError::configuration(format!("Invalid licence template: {}", e)))?;
        Ok(Self { registry, app })
    }

    /// Prepend the header to `content`, keeping a doctype or XML declaration first.
    pub fn apply(&self, file: &str, content: &str) -> Result<String, BuildError> {
        let header = self
            .registry
            .render(TEMPLATE_NAME, &json!({ "app": &self.app, "file": file }))
            .map_err(|e| BuildError::render(file, format!("Cannot render licence: {}", e)))?;

        let output = format!("{}{}", header, content);
        match PROLOG.find(&output) {
            Some(prolog) if prolog.start() != 0 => {
                let prolog = prolog.as_str().to_string();
                Ok(format!("{}\n{}", prolog, PROLOG.replace(&output, "")))
            }
            _ => Ok(output),
        }
    }
}
