//! End-to-end builds of small multilingual sites.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use webgen::{BuildError, Settings, SiteBuilder};

const CONFIG: &str = "\
appName: demo
appVersion: 1.0.0
rootUrl: http://x
licenseTemplateFile: license.txt
i18n:
  source: i18n.csv
  labels:
    en:
      en: English
      fr: Anglais
    fr:
      en: French
      fr: Français
content:
  sitemap:
    main:
      - index.hbs
      - features.hbs:
        - php.md
";

const MASTER: &str = "<!DOCTYPE html>
<html lang=\"{{lang}}\"><head><title>{{get-title reference}}</title><link rel=\"stylesheet\" href=\"css/site.css\"></head>
<body><ul>{{#each menus.main}}<li{{get-menu-item-classes @first @last @root.currentPath id children}}>{{get-title id short=true}}</li>{{/each}}</ul>
{{> content}}</body></html>";

const INDEX: &str = "<!-- start-content-config
title: Home
master: default
path:
  en: /index.html
  fr: /fr/index.html
  de: /de/index.html
end-content-config -->
<h1><i18n>Welcome</i18n></h1>
<p><fr>Version française</fr><not-fr>Other languages</not-fr></p>
<a id=\"features\" href=\"{{get-path \"features.hbs\"}}\">{{get-title \"features.hbs\"}}</a>";

const FEATURES: &str = "<!-- start-content-config
title: Features
master: default
path:
  en: /features.html
  fr: /fr/features.html
end-content-config -->
<p>{{#foreach-language}}<a hreflang=\"{{lang}}\" href=\"{{path}}\">{{get-language-label lang}}</a>{{/foreach-language}}</p>";

const PHP: &str = "<!-- start-content-config
title: PHP support
shortTitle: PHP
master: default
path: /docs/php/index.html
xmlsitemap:
  priority: 0.8
  frequency: weekly
end-content-config -->

# {{title}}

![logo](docs/img/logo.png)

[Home](index.html)
";

fn write(root: &Path, path: &str, text: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "webgen.yaml", config);
    write(root, "i18n.csv", "en,fr\r\nWelcome,Bienvenue\r\n");
    write(root, "src/license.txt", "{{app.appName}} {{app.appVersion}} {{file}}");
    write(root, "src/masters/default.hbs", MASTER);
    write(root, "src/contents/index.hbs", INDEX);
    write(root, "src/contents/features.hbs", FEATURES);
    write(root, "src/contents/php.md", PHP);
    dir
}

fn builder(dir: &TempDir, release: bool) -> SiteBuilder {
    let mut settings = Settings::load(&dir.path().join("webgen.yaml")).unwrap();
    if release {
        settings.enable_release_mode();
    }
    let mut builder = SiteBuilder::new(settings);
    builder.set_parallel_jobs(2);
    builder
}

fn url_entry<'a>(urls: &[&'a str], loc: &str) -> &'a str {
    let needle = format!("\n<loc>{}</loc>", loc);
    urls.iter()
        .copied()
        .find(|u| u.starts_with(&needle))
        .unwrap_or_else(|| panic!("no entry for {}", loc))
}

fn read(dir: &Path, path: &str) -> String {
    fs::read_to_string(dir.join(path)).unwrap_or_else(|e| panic!("{}: {}", path, e))
}

#[tokio::test]
async fn test_development_build_writes_every_language() {
    let dir = project(CONFIG);
    let builder = builder(&dir, false);
    let stats = builder.build().await.unwrap();

    assert_eq!(stats.contents_processed, 3);
    assert_eq!(stats.pages_written, 6);
    assert_eq!(stats.sitemap_urls, 6);

    let out = builder.settings().build_path().to_path_buf();
    assert!(out.ends_with("build-dev"));
    for page in [
        "index.html",
        "fr/index.html",
        "de/index.html",
        "features.html",
        "fr/features.html",
        "docs/php/index.html",
        "sitemap.xml",
    ] {
        assert!(out.join(page).is_file(), "missing {}", page);
    }
}

#[tokio::test]
async fn test_paths_titles_and_translations() {
    let dir = project(CONFIG);
    let builder = builder(&dir, false);
    builder.build().await.unwrap();
    let out = builder.settings().build_path().to_path_buf();

    let fr = read(&out, "fr/index.html");
    assert!(fr.starts_with("<!DOCTYPE html>\n<html lang=\"fr\">"));
    assert!(fr.contains("<title>Home</title>"));
    assert!(fr.contains("<h1>Bienvenue</h1>"));
    assert!(fr.contains("<a id=\"features\" href=\"features.html\">Features</a>"));
    assert!(fr.contains("Version française"));
    assert!(!fr.contains("Other languages"));
    assert!(fr.contains("href=\"../css/site.css\""));

    let de = read(&out, "de/index.html");
    assert!(de.contains(
        "<span class=\"webgen-debug webgen-error i18n-error i18n-missing-translation i18n-is-language-fallback\">Welcome</span>"
    ));
    assert!(de.contains("Other languages"));
    assert!(de.contains("<li class=\"first active\">Home</li>"));

    let features = read(&out, "features.html");
    assert!(features.contains("<a hreflang=\"en\" href=\"features.html\">English</a>"));
    assert!(features.contains("<a hreflang=\"fr\" href=\"fr/features.html\">Français</a>"));
}

#[tokio::test]
async fn test_nested_output_links_and_menus() {
    let dir = project(CONFIG);
    let builder = builder(&dir, false);
    builder.build().await.unwrap();
    let out = builder.settings().build_path().to_path_buf();

    let php = read(&out, "docs/php/index.html");
    assert!(php.contains("<h1>PHP support</h1>"));
    assert!(php.contains("src=\"../img/logo.png\""));
    assert!(php.contains("href=\"../../css/site.css\""));
    // the directory index is dropped from links
    assert!(php.contains("href=\"../../\""));
    assert!(php.contains("<li class=\"first\">Home</li><li class=\"last active-trail\">Features</li>"));
}

#[tokio::test]
async fn test_sitemap_lists_targets_with_alternates() {
    let dir = project(CONFIG);
    let builder = builder(&dir, false);
    builder.build().await.unwrap();
    let sitemap = read(builder.settings().build_path(), "sitemap.xml");

    let urls: Vec<&str> = sitemap.split("<url>").skip(1).collect();
    assert_eq!(urls.len(), 6);
    let url = |loc: &str| url_entry(&urls, loc);

    for loc in ["http://x/", "http://x/fr/", "http://x/de/"] {
        assert_eq!(url(loc).matches("hreflang=").count(), 3);
    }
    assert!(url("http://x/fr/").contains("<xhtml:link rel=\"alternate\" hreflang=\"de\" href=\"http://x/de/\" />"));
    assert_eq!(url("http://x/features.html").matches("hreflang=").count(), 2);

    let php = url("http://x/docs/php/");
    assert!(php.contains("<priority>0.8</priority>"));
    assert!(php.contains("<changefreq>weekly</changefreq>"));
    assert!(!url("http://x/").contains("<priority>"));
}

#[tokio::test]
async fn test_release_build() {
    let dir = project(CONFIG);
    let builder = builder(&dir, true);
    builder.build().await.unwrap();
    let out = builder.settings().build_path().to_path_buf();
    assert!(out.ends_with("demo-1.0.0"));
    assert!(!dir.path().join("build-dev").exists());

    let de = read(&out, "de/index.html");
    assert!(de.starts_with("<!DOCTYPE html>\n<!--\n * demo 1.0.0 de/index.html\n-->"));
    assert!(de.contains("<h1>Welcome</h1>"));
    assert!(!de.contains("i18n-missing-translation"));

    let sitemap = read(&out, "sitemap.xml");
    assert!(sitemap.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!--\n * demo 1.0.0 sitemap.xml\n-->"));
}

#[tokio::test]
async fn test_cyclic_menu_fails_before_any_output() {
    let config = CONFIG.replace("        - php.md\n", "        - php.md:\n          - features.hbs\n");
    let dir = project(&config);
    let builder = builder(&dir, false);

    let err = builder.build().await.unwrap_err();
    assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::Configuration(_))));
    assert!(!dir.path().join("build-dev").exists());
}

#[tokio::test]
async fn test_render_errors_are_isolated() {
    let dir = project(CONFIG);
    write(
        dir.path(),
        "src/contents/broken.hbs",
        "<p>before</p>{{get-language-label \"xx\"}}<p>after</p>",
    );
    let builder = builder(&dir, false);
    let stats = builder.build().await.unwrap();
    let out = builder.settings().build_path().to_path_buf();

    assert_eq!(stats.pages_written, 7);
    let broken = read(&out, "broken.html");
    assert!(broken.contains("<p>before</p>"));
    assert!(!broken.contains("after"));
    assert!(stats
        .warning_details
        .iter()
        .any(|w| w.subject == "broken.hbs"));
    assert!(out.join("index.html").is_file());
}

#[tokio::test]
async fn test_missing_include_aborts_the_build() {
    let dir = project(CONFIG);
    write(
        dir.path(),
        "src/contents/include.hbs",
        "{{include-file \"partials/missing.hbs\"}}",
    );
    let builder = builder(&dir, false);

    let err = builder.build().await.unwrap_err();
    assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::Io { .. })));
    assert!(!dir.path().join("build-dev").exists());
}

#[tokio::test]
async fn test_clean_removes_build_directories() {
    let dir = project(CONFIG);
    builder(&dir, false).build().await.unwrap();
    builder(&dir, true).build().await.unwrap();

    let removed = builder(&dir, false).clean().await.unwrap();
    assert_eq!(removed.len(), 2);
    assert!(!dir.path().join("build-dev").exists());
    assert!(!dir.path().join("demo-1.0.0").exists());
}

#[test]
fn test_context_symmetry_on_a_real_site() {
    let dir = project(CONFIG);
    let site = builder(&dir, false).render_site().unwrap();

    for (key, entry) in site.context.entries() {
        match entry.target.as_deref() {
            Some(target) => {
                assert_eq!(target, key);
                let lang = entry.lang.as_deref().unwrap();
                let reference = site.context.get(&entry.reference).unwrap();
                assert_eq!(reference.translation_set[lang], key);
            }
            None => assert_eq!(entry.reference, key),
        }
    }
}

#[tokio::test]
async fn test_extracted_table_feeds_the_next_build() {
    let dir = project(CONFIG);
    write(
        dir.path(),
        "src/contents/contact.hbs",
        "<p>{i18n Write  to us}</p><p><i18n>Welcome</i18n></p>",
    );
    let builder = builder(&dir, false);

    let (path, count) = builder.extract_i18n().await.unwrap();
    assert!(path.ends_with("i18n.csv"));
    assert_eq!(count, 2);
    let table = read(dir.path(), "i18n.csv");
    assert_eq!(
        table,
        "source file (first match),comment,en,fr\r\n\
         contents/contact.hbs,,Welcome,Bienvenue\r\n\
         contents/contact.hbs,,Write to us,\r\n"
    );

    builder.build().await.unwrap();
    let out = builder.settings().build_path().to_path_buf();
    assert!(read(&out, "fr/index.html").contains("<h1>Bienvenue</h1>"));
    let contact = read(&out, "contact.html");
    assert!(contact.contains("<p>Write to us</p><p>Welcome</p>"));
}
