//! Path multiplexing: one render job per declared language of a content.

use crate::context::SiteContext;
use crate::error::BuildError;

/// One language rendering of one content file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    /// Source path of the content
    pub source: String,
    pub lang: String,
    /// Output path relative to the build directory
    pub output_path: String,
}

/// Split the content registered under `source` into its per-language jobs,
/// in translation set order.
pub fn demux(source: &str, context: &SiteContext) -> Result<Vec<RenderJob>, BuildError> {
    let entry = context
        .get(source)
        .ok_or_else(|| BuildError::UnregisteredContent(source.to_string()))?;

    Ok(entry
        .translation_set
        .iter()
        .map(|(lang, output_path)| RenderJob {
            source: entry.reference.clone(),
            lang: lang.clone(),
            output_path: output_path.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SiteContextBuilder;
    use crate::descriptor::DescriptorParser;
    use crate::links::DirectoryIndex;

    fn context() -> SiteContext {
        let parser = DescriptorParser::new("en");
        let mut builder =
            SiteContextBuilder::with_values("http://x", DirectoryIndex::default(), "en");
        let text = "<!-- start-content-config\npath:\n  en: /php.html\n  fr: /php-fr.html\nend-content-config -->";
        builder.add(&parser.parse("php.hbs", text).unwrap());
        builder.build()
    }

    #[test]
    fn test_one_job_per_language() {
        let jobs = demux("php.hbs", &context()).unwrap();
        assert_eq!(
            jobs,
            vec![
                RenderJob {
                    source: "php.hbs".to_string(),
                    lang: "en".to_string(),
                    output_path: "php.html".to_string(),
                },
                RenderJob {
                    source: "php.hbs".to_string(),
                    lang: "fr".to_string(),
                    output_path: "php-fr.html".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_unregistered_content() {
        let err = demux("missing.hbs", &context()).unwrap_err();
        assert!(matches!(err, BuildError::UnregisteredContent(ref path) if path == "missing.hbs"));
        assert!(!err.is_fatal());
    }
}
