//! Translations.
//!
//! The translation table is a CSV file whose header row names the columns
//! (language codes, plus free columns such as `comment`) and whose rows hold
//! one translatable string each. Rows are keyed by their text in the
//! fallback language. `webgen extract` regenerates that file from the
//! markers found in the sources. Rendered pages may contain `<i18n>text</i18n>` or
//! `{i18n text}` markers, and language filter tags `<xx>...</xx>` (kept only
//! for language `xx`) and `<not-xx>...</not-xx>` (kept for all others).

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::error::{BuildError, BuildWarning, Diagnostics, WarningKind};

lazy_static! {
    static ref I18N_TAG: Regex = Regex::new(r"<i18n>((?s:.*?))</i18n>").unwrap();
    static ref I18N_BRACES: Regex = Regex::new(r"\{i18n\s+([^}]*?)\s*\}").unwrap();
}

/// Source of translated strings.
pub trait TranslationLookup: Send + Sync {
    /// Translation of `source` (fallback-language text) into `lang`, if any.
    fn get_translation(&self, source: &str, lang: &str) -> Option<String>;
}

/// Collapse runs of whitespace and trim.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// In-memory translation table.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    table: IndexMap<String, IndexMap<String, String>>,
}

impl Translations {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the table from rows. Rows without fallback-language text are ignored.
    pub fn from_rows(rows: Vec<IndexMap<String, String>>, fallback_language: &str) -> Self {
        let mut table = IndexMap::new();
        for row in rows {
            let Some(key) = row.get(fallback_language).map(|k| normalize(k)) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let entry: &mut IndexMap<String, String> = table.entry(key).or_default();
            for (lang, text) in row {
                entry.insert(lang, normalize(&text));
            }
        }
        Self { table }
    }

    /// Load the table from `path`. An unreadable file is only a warning and
    /// yields an empty table; a malformed one is a configuration error.
    pub fn load(
        path: &Path,
        fallback_language: &str,
        diagnostics: &Diagnostics,
    ) -> Result<Self, BuildError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                diagnostics.warn(BuildWarning::new(
                    WarningKind::Translation,
                    "i18n",
                    path.display().to_string(),
                    format!("Cannot read i18n input file: {}", e),
                ));
                return Ok(Self::empty());
            }
        };

        let rows = read_csv_rows(text.as_bytes()).map_err(|e| {
            BuildError::configuration(format!(
                "Cannot parse i18n input file |{}|: {}",
                path.display(),
                e
            ))
        })?;
        let translations = Self::from_rows(rows, fallback_language);
        log::debug!(
            "Loaded {} translatable strings from {}",
            translations.len(),
            path.display()
        );
        Ok(translations)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Rows of a CSV table, keyed by the header row.
pub fn read_csv_rows<R: io::Read>(input: R) -> Result<Vec<IndexMap<String, String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(input);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: IndexMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

impl TranslationLookup for Translations {
    fn get_translation(&self, source: &str, lang: &str) -> Option<String> {
        self.table
            .get(&normalize(source))
            .and_then(|row| row.get(lang))
            .filter(|text| !text.is_empty())
            .cloned()
    }
}

/// Translates strings and processes i18n markup in rendered pages.
#[derive(Clone)]
pub struct I18nProcessor {
    lookup: Arc<dyn TranslationLookup>,
    fallback_language: String,
    is_release: bool,
    /// (language, `<xx>` filter, `<not-xx>` filter)
    filters: Vec<(String, Regex, Regex)>,
}

impl std::fmt::Debug for I18nProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I18nProcessor")
            .field("fallback_language", &self.fallback_language)
            .field("is_release", &self.is_release)
            .field("languages", &self.filters.iter().map(|(l, _, _)| l).collect::<Vec<_>>())
            .finish()
    }
}

fn language_filter(prefix: &str, lang: &str) -> Result<Regex, BuildError> {
    let tag = format!("{}{}", prefix, regex::escape(lang));
    Regex::new(&format!(r"<{tag}(?:\s[^>]*)?>((?s:.*?))</{tag}>")).map_err(|e| {
        BuildError::configuration(format!("Invalid language code |{}|: {}", lang, e))
    })
}

impl I18nProcessor {
    /// `languages` are the codes that get filter tags, usually the label table keys.
    pub fn new(
        lookup: Arc<dyn TranslationLookup>,
        fallback_language: impl Into<String>,
        languages: impl IntoIterator<Item = String>,
        is_release: bool,
    ) -> Result<Self, BuildError> {
        let filters = languages
            .into_iter()
            .map(|lang| {
                let same = language_filter("", &lang)?;
                let not = language_filter("not-", &lang)?;
                Ok((lang, same, not))
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        Ok(Self {
            lookup,
            fallback_language: fallback_language.into(),
            is_release,
            filters,
        })
    }

    pub fn fallback_language(&self) -> &str {
        &self.fallback_language
    }

    /// Translate `source` into `lang`.
    ///
    /// Without a translation, the fallback-language text is used. Outside
    /// release builds the result is wrapped in a flagged `<span>`; in release
    /// builds it is inserted bare, or the source itself when there is no
    /// fallback either.
    pub fn translate_or_warn(
        &self,
        source: &str,
        lang: &str,
        subject: &str,
        diagnostics: &Diagnostics,
    ) -> String {
        let source = normalize(source);
        if let Some(translation) = self.lookup.get_translation(&source, lang) {
            return translation;
        }

        diagnostics.warn(BuildWarning::new(
            WarningKind::Translation,
            "i18n",
            subject,
            format!(
                "Cannot find translation for |{}| in |{}|. Falling back to fallback language |{}|.",
                source, lang, self.fallback_language
            ),
        ));

        let fallback = self.lookup.get_translation(&source, &self.fallback_language);
        let flag = if fallback.is_some() {
            "i18n-is-language-fallback"
        } else {
            diagnostics.warn(BuildWarning::new(
                WarningKind::Translation,
                "i18n",
                subject,
                format!(
                    "Also no translation for the fallback language |{}|.",
                    self.fallback_language
                ),
            ));
            "i18n-no-language-fallback"
        };

        let text = fallback.unwrap_or(source);
        if self.is_release {
            text
        } else {
            format!(
                "<span class=\"webgen-debug webgen-error i18n-error i18n-missing-translation {}\">{}</span>",
                flag, text
            )
        }
    }

    /// Apply language filter tags, then translate every i18n marker.
    pub fn process(
        &self,
        content: &str,
        lang: &str,
        subject: &str,
        diagnostics: &Diagnostics,
    ) -> String {
        let mut output = content.to_string();
        for (filter_lang, same, _) in &self.filters {
            let keep = filter_lang == lang;
            output = replace_filter(same, &output, keep);
        }
        for (filter_lang, _, not) in &self.filters {
            let keep = filter_lang != lang;
            output = replace_filter(not, &output, keep);
        }

        let translate = |caps: &Captures| self.translate_or_warn(&caps[1], lang, subject, diagnostics);
        let output = I18N_TAG.replace_all(&output, translate).into_owned();
        I18N_BRACES.replace_all(&output, translate).into_owned()
    }
}

const SOURCE_FILE_COLUMN: &str = "source file (first match)";
const COMMENT_COLUMN: &str = "comment";

/// Translatable strings collected from template sources, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// string to the first file it was found in
    strings: IndexMap<String, String>,
}

impl Extraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the `<i18n>` markers of `content`, then its `{i18n}` markers.
    /// Markers wrapping a template expression are skipped.
    pub fn scan(&mut self, file: &str, content: &str) {
        let found = I18N_TAG
            .captures_iter(content)
            .chain(I18N_BRACES.captures_iter(content))
            .map(|caps| caps[1].to_string());
        for source in found {
            if source.starts_with("{{") {
                continue;
            }
            let source = normalize(&source);
            if !source.is_empty() && !self.strings.contains_key(&source) {
                self.strings.insert(source, file.to_string());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.strings.keys().map(String::as_str)
    }

    /// Write the translation table: one row per string, keeping the
    /// translations and comments `existing` already has.
    pub fn write_csv<W: io::Write>(
        &self,
        output: W,
        existing: &dyn TranslationLookup,
        languages: &[String],
        fallback_language: &str,
    ) -> Result<(), csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(output);

        let mut header = vec![SOURCE_FILE_COLUMN, COMMENT_COLUMN];
        header.extend(languages.iter().map(String::as_str));
        writer.write_record(&header)?;

        for (source, file) in &self.strings {
            let mut row = vec![
                file.clone(),
                existing.get_translation(source, COMMENT_COLUMN).unwrap_or_default(),
            ];
            for lang in languages {
                row.push(if lang == fallback_language {
                    source.clone()
                } else {
                    existing.get_translation(source, lang).unwrap_or_default()
                });
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn replace_filter(filter: &Regex, content: &str, keep: bool) -> String {
    filter
        .replace_all(content, |caps: &Captures| {
            if keep {
                caps[1].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "comment,en,fr\r\n\
        greeting,\"Hello  world\",Bonjour le monde\r\n\
        ,Contact,\r\n\
        ,,orphan\r\n";

    fn translations() -> Translations {
        Translations::from_rows(read_csv_rows(TABLE.as_bytes()).unwrap(), "en")
    }

    fn processor(is_release: bool) -> I18nProcessor {
        I18nProcessor::new(
            Arc::new(translations()),
            "en",
            vec!["en".to_string(), "fr".to_string(), "de".to_string()],
            is_release,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_normalizes_whitespace() {
        let t = translations();
        assert_eq!(t.len(), 2);
        assert_eq!(
            t.get_translation("Hello\n   world", "fr").as_deref(),
            Some("Bonjour le monde")
        );
        assert_eq!(t.get_translation("Contact", "fr"), None);
    }

    #[test]
    fn test_missing_translation_debug_marker() {
        let diagnostics = Diagnostics::new();
        let out = processor(false).translate_or_warn("Contact", "de", "index.hbs", &diagnostics);
        assert_eq!(
            out,
            "<span class=\"webgen-debug webgen-error i18n-error i18n-missing-translation i18n-is-language-fallback\">Contact</span>"
        );
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn test_missing_translation_release() {
        let diagnostics = Diagnostics::new();
        let p = processor(true);
        assert_eq!(p.translate_or_warn("Contact", "de", "index.hbs", &diagnostics), "Contact");
        assert_eq!(p.translate_or_warn("Unknown", "de", "index.hbs", &diagnostics), "Unknown");
        assert_eq!(diagnostics.warning_count(), 3);
    }

    #[test]
    fn test_no_fallback_flag() {
        let diagnostics = Diagnostics::new();
        let out = processor(false).translate_or_warn("Nothing", "fr", "x", &diagnostics);
        assert!(out.contains("i18n-no-language-fallback"));
        assert!(out.contains(">Nothing</span>"));
    }

    #[test]
    fn test_process_markers() {
        let diagnostics = Diagnostics::new();
        let out = processor(false).process(
            "<p><i18n>Hello\n world</i18n> / {i18n Hello world }</p>",
            "fr",
            "index.hbs",
            &diagnostics,
        );
        assert_eq!(out, "<p>Bonjour le monde / Bonjour le monde</p>");
        assert_eq!(diagnostics.warning_count(), 0);
    }

    #[test]
    fn test_language_filters() {
        let diagnostics = Diagnostics::new();
        let input = "<fr>Salut</fr><en>Hi</en><not-fr>Not French</not-fr><del>x</del>";
        let p = processor(false);
        assert_eq!(
            p.process(input, "fr", "x", &diagnostics),
            "Salut<del>x</del>"
        );
        assert_eq!(
            p.process(input, "en", "x", &diagnostics),
            "HiNot French<del>x</del>"
        );
    }

    #[test]
    fn test_missing_file_is_warning() {
        let diagnostics = Diagnostics::new();
        let t = Translations::load(Path::new("/nonexistent/i18n.csv"), "en", &diagnostics).unwrap();
        assert!(t.is_empty());
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn test_csv_columns_and_quoting() {
        let t = Translations::from_rows(
            read_csv_rows("en,fr,de\n\"Say \"\"hi\"\", then go\",\"Dis \"\"salut\"\"\"\n".as_bytes()).unwrap(),
            "en",
        );
        assert_eq!(
            t.get_translation("Say \"hi\", then go", "fr").as_deref(),
            Some("Dis \"salut\"")
        );
        // short rows leave the missing columns untranslated
        assert_eq!(t.get_translation("Say \"hi\", then go", "de"), None);
        assert_eq!(t.get_translation("Hello world", "comment"), None);
        assert_eq!(translations().get_translation("Hello world", "comment").as_deref(), Some("greeting"));
    }

    #[test]
    fn test_extraction_collects_markers_once() {
        let mut extraction = Extraction::new();
        extraction.scan(
            "masters/default.hbs",
            "<i18n>Hello\n  world</i18n> {i18n Contact } <i18n>{{title}}</i18n>",
        );
        extraction.scan("contents/index.hbs", "<i18n>Contact</i18n><i18n>New  one</i18n>");

        let strings: Vec<&str> = extraction.strings().collect();
        assert_eq!(strings, vec!["Hello world", "Contact", "New one"]);
    }

    #[test]
    fn test_extraction_keeps_existing_translations() {
        let mut extraction = Extraction::new();
        extraction.scan("masters/default.hbs", "<i18n>Hello world</i18n><i18n>New one</i18n>");

        let mut out = Vec::new();
        let languages = vec!["en".to_string(), "fr".to_string()];
        extraction
            .write_csv(&mut out, &translations(), &languages, "en")
            .unwrap();
        let csv = String::from_utf8(out).unwrap();
        assert_eq!(
            csv,
            "source file (first match),comment,en,fr\r\n\
             masters/default.hbs,greeting,Hello world,Bonjour le monde\r\n\
             masters/default.hbs,,New one,\r\n"
        );

        // the written table loads back
        let reloaded = Translations::from_rows(read_csv_rows(csv.as_bytes()).unwrap(), "en");
        assert_eq!(reloaded.get_translation("Hello world", "fr").as_deref(), Some("Bonjour le monde"));
        assert_eq!(reloaded.get_translation("New one", "en").as_deref(), Some("New one"));
    }
}
