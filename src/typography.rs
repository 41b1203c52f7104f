//! Typographic post-processing of rendered pages.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref NO_TYPO: Regex = Regex::new(r"<no-typo>((?s:.*?))</no-typo>").unwrap();
    static ref NO_TYPO_PLACEHOLDER: Regex = Regex::new(r#"<no-typo id="(\d+)" />"#).unwrap();
    static ref NO_BREAK: Regex = Regex::new(r"<no-break>((?s:.*?))</no-break>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref TEXT_NODE: Regex = Regex::new(r">(\s*)([^<]+?)(\s*)<").unwrap();
    static ref NUMBER_THEN_WORD: Regex = Regex::new(r"(\s+\d+)\s+").unwrap();
    static ref SINGLE_LETTER: Regex = Regex::new(r"(\s+\p{L})\s+").unwrap();
    static ref BOUND_SINGLE_LETTER: Regex = Regex::new(r"(&nbsp;\p{L})\s+").unwrap();
}

/// Rewrites page text for a language.
pub trait TypographyProcessor: Send + Sync {
    fn process(&self, content: &str, lang: &str) -> String;
}

/// `<no-typo>` blocks are left alone, `<no-break>` blocks are joined with
/// non-breaking spaces, and text nodes get the English spacing rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypography;

impl TypographyProcessor for DefaultTypography {
    fn process(&self, content: &str, _lang: &str) -> String {
        let mut protected = Vec::new();
        let content = NO_TYPO.replace_all(content, |caps: &Captures| {
            protected.push(caps[1].to_string());
            format!("<no-typo id=\"{}\" />", protected.len() - 1)
        });

        let content = NO_BREAK.replace_all(&content, |caps: &Captures| {
            WHITESPACE.replace_all(caps[1].trim(), "&nbsp;").into_owned()
        });

        // English spacing rules apply to every language for now
        let content = english_rules(&content);

        NO_TYPO_PLACEHOLDER
            .replace_all(&content, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| protected.get(i))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

fn english_rules(content: &str) -> String {
    TEXT_NODE
        .replace_all(content, |caps: &Captures| {
            let text = NUMBER_THEN_WORD.replace_all(&caps[2], "${1}&nbsp;");
            let text = SINGLE_LETTER.replace_all(&text, "${1}&nbsp;");
            let text = BOUND_SINGLE_LETTER.replace_all(&text, "${1}&nbsp;");
            format!(">{}{}{}<", &caps[1], text, &caps[3])
        })
        .into_owned()
}
