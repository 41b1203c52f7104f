//! Build settings.
//!
//! Settings are read from the project's `webgen.yaml`, merged over the
//! embedded defaults, and completed with values derived from the project
//! layout and the build target (development or release).

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value as YamlValue;
use std::path::{Path, PathBuf};

use crate::error::BuildError;

const DEFAULT_CONFIG: &str = include_str!("../config.default.yaml");
const CONFIG_FILE_NAME: &str = "webgen.yaml";
const CONFIG_ENV_VAR: &str = "WEBGEN_CONFIG";

const CHANGE_FREQUENCIES: &[&str] = &[
    "auto", "always", "hourly", "daily", "weekly", "monthly", "yearly", "never",
];

/// Fully resolved settings for one build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub generator_name: Option<String>,
    pub root_url: String,
    pub source_path_root: String,
    pub build_path_root: String,
    /// Base for `/`-prefixed partials and included files
    #[serde(default)]
    pub tools_path_root: Option<String>,
    #[serde(default)]
    pub license_template_file: Option<String>,
    pub i18n: I18nSettings,
    pub content: ContentSettings,
    #[serde(default)]
    pub styles: AssetSets,
    #[serde(default)]
    pub scripts: AssetSets,

    #[serde(skip)]
    pub paths: ProjectPaths,
    #[serde(skip)]
    pub target: BuildTarget,
    #[serde(skip)]
    pub license_text: Option<String>,
    #[serde(skip)]
    pub build_date_time: String,
    #[serde(skip)]
    pub build_user: String,
    #[serde(skip)]
    pub build_random_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct I18nSettings {
    /// Translation table, relative to the project root
    #[serde(default)]
    pub source: Option<String>,
    pub fallback_language: String,
    /// `labels[requested][current]` is the name of `requested` written in `current`
    #[serde(default)]
    pub labels: IndexMap<String, IndexMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSettings {
    pub input: Vec<String>,
    #[serde(default)]
    pub directory_index_pattern: Option<String>,
    #[serde(default)]
    pub partials: IndexMap<String, String>,
    /// Declarative menus: plain strings are leaves, single-key maps open a submenu
    #[serde(default)]
    pub sitemap: IndexMap<String, Vec<YamlValue>>,
    #[serde(default)]
    pub xmlsitemap: XmlSitemapSetting,
    #[serde(default)]
    pub watch_more: Vec<String>,
}

/// Bundled asset files, keyed by the output file of each set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetSets {
    /// Set output file to its sources
    #[serde(default)]
    pub sets: IndexMap<String, YamlValue>,
}

/// `xmlsitemap: false` disables the sitemap, a mapping provides its defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum XmlSitemapSetting {
    Enabled(XmlSitemapDefaults),
    Switch(bool),
}

impl Default for XmlSitemapSetting {
    fn default() -> Self {
        XmlSitemapSetting::Switch(false)
    }
}

impl XmlSitemapSetting {
    pub fn defaults(&self) -> Option<XmlSitemapDefaults> {
        match self {
            XmlSitemapSetting::Enabled(defaults) => Some(defaults.clone()),
            XmlSitemapSetting::Switch(true) => Some(XmlSitemapDefaults::default()),
            XmlSitemapSetting::Switch(false) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XmlSitemapDefaults {
    #[serde(default, deserialize_with = "deserialize_scalar")]
    pub default_priority: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar")]
    pub default_change_frequency: Option<String>,
}

/// Directories of the project being built.
#[derive(Debug, Clone, Default)]
pub struct ProjectPaths {
    pub config_file: PathBuf,
    /// Directory holding the configuration file
    pub root: PathBuf,
    pub source_root: PathBuf,
    pub tools_root: PathBuf,
}

/// Values that depend on the release flag.
#[derive(Debug, Clone, Default)]
pub struct BuildTarget {
    pub is_release: bool,
    pub build_path: PathBuf,
    pub build_assets_suffix: String,
}

/// Settings exposed to templates and licence headers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVariables {
    pub author: String,
    pub is_release: bool,
    pub build_date_time: String,
    pub build_user: String,
    pub root_url: String,
    pub app_name: String,
    pub app_version: String,
    pub generator_name: String,
    pub generator_version: String,
}

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    author: Option<serde_json::Value>,
}

/// Accept YAML strings, numbers and booleans for fields that are kept as text.
pub(crate) fn deserialize_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<YamlValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(YamlValue::String(s)) => Some(s),
        Some(YamlValue::Number(n)) => Some(n.to_string()),
        Some(YamlValue::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Recursively merge `overlay` into `base`. Mappings merge key by key, anything else is replaced.
pub fn merge_yaml(base: &mut YamlValue, overlay: YamlValue) {
    match (base, overlay) {
        (YamlValue::Mapping(base_map), YamlValue::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// YAML does not allow tabs for indentation.
pub fn normalize_tabs(input: &str) -> String {
    input.replace('\t', " ")
}

fn parse_yaml(input: &str, origin: &str) -> Result<YamlValue, BuildError> {
    let value: YamlValue = serde_yaml::from_str(&normalize_tabs(input))
        .map_err(|e| BuildError::configuration(format!("Cannot parse |{}|: {}", origin, e)))?;
    Ok(match value {
        YamlValue::Null => YamlValue::Mapping(Default::default()),
        other => other,
    })
}

impl Settings {
    /// Load the settings from a `webgen.yaml` file.
    pub fn load(config_file: &Path) -> Result<Self, BuildError> {
        let input = std::fs::read_to_string(config_file)
            .map_err(|e| BuildError::io(config_file, e))?;
        let config_file = config_file
            .canonicalize()
            .map_err(|e| BuildError::io(config_file, e))?;
        let root = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut settings = Self::from_yaml_str(&input, &root)?;
        settings.paths.config_file = config_file;
        Ok(settings)
    }

    /// Build settings from YAML text, with `root` as the project directory.
    pub fn from_yaml_str(input: &str, root: &Path) -> Result<Self, BuildError> {
        let mut merged = parse_yaml(DEFAULT_CONFIG, "config.default.yaml")?;
        merge_yaml(&mut merged, parse_yaml(input, CONFIG_FILE_NAME)?);

        let mut settings: Settings = serde_yaml::from_value(merged)
            .map_err(|e| BuildError::configuration(format!("Invalid configuration: {}", e)))?;

        settings.apply_package_json(root);
        if settings.app_name.is_empty() {
            return Err(BuildError::configuration(
                "Missing configuration: name (package.json) or appName (webgen.yaml)",
            ));
        }
        if settings.app_version.is_empty() {
            return Err(BuildError::configuration(
                "Missing configuration: version (package.json) or appVersion (webgen.yaml)",
            ));
        }

        let source_root = root.join(&settings.source_path_root);
        let tools_root = settings
            .tools_path_root
            .as_ref()
            .map(|p| root.join(p))
            .unwrap_or_else(|| root.to_path_buf());
        settings.paths = ProjectPaths {
            config_file: root.join(CONFIG_FILE_NAME),
            root: root.to_path_buf(),
            source_root,
            tools_root,
        };

        let now = Utc::now();
        settings.build_date_time = now.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        settings.build_user = std::env::var("USER").unwrap_or_default();
        settings.build_random_id = format!("dev-{}-{}", now.timestamp_millis(), std::process::id());

        if let Some(file) = settings.license_template_file.clone() {
            let path = settings.paths.source_root.join(&file);
            let text = std::fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
            settings.license_text = Some(text);
        }

        settings.adapt_build_target(false);
        settings.validate()?;
        Ok(settings)
    }

    fn apply_package_json(&mut self, root: &Path) {
        let package = std::fs::read_to_string(root.join("package.json"))
            .ok()
            .and_then(|text| serde_json::from_str::<PackageJson>(&text).ok())
            .unwrap_or_default();

        if let Some(name) = package.name {
            self.app_name = name;
        }
        if let Some(version) = package.version {
            self.app_version = version;
        }
        match package.author {
            Some(serde_json::Value::String(author)) => self.author = Some(author),
            Some(serde_json::Value::Object(author)) => {
                if let Some(name) = author.get("name").and_then(|n| n.as_str()) {
                    self.author = Some(name.to_string());
                }
            }
            _ => {}
        }
    }

    /// Switch to release mode: minified, fingerprinted, licensed output in a versioned directory.
    pub fn enable_release_mode(&mut self) {
        self.adapt_build_target(true);
    }

    fn adapt_build_target(&mut self, is_release: bool) {
        let build_root = self.paths.root.join(&self.build_path_root);
        self.target = if is_release {
            let hash = blake3::hash(self.app_version.as_bytes()).to_hex();
            BuildTarget {
                is_release,
                build_path: build_root.join(format!("{}-{}", self.app_name, self.app_version)),
                build_assets_suffix: format!(".{}.min", &hash.as_str()[..8]),
            }
        } else {
            BuildTarget {
                is_release,
                build_path: build_root.join("build-dev"),
                build_assets_suffix: format!(".{}", self.build_random_id),
            }
        };
    }

    fn validate(&self) -> Result<(), BuildError> {
        if self.root_url.is_empty() {
            return Err(BuildError::configuration("No root URL."));
        }
        if self.i18n.fallback_language.is_empty() {
            return Err(BuildError::configuration("No fallback language specified."));
        }
        if self.content.input.is_empty() {
            return Err(BuildError::configuration("No input filter for template contents."));
        }
        if let Some(pattern) = &self.content.directory_index_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                BuildError::configuration(format!("Invalid directory index pattern |{}|: {}", pattern, e))
            })?;
        }
        if let Some(defaults) = self.content.xmlsitemap.defaults() {
            validate_sitemap_defaults(&defaults)?;
        }
        for set in self.styles.sets.keys().chain(self.scripts.sets.keys()) {
            if !set.ends_with(".js") && !set.ends_with(".css") {
                return Err(BuildError::configuration(format!(
                    "Provided |{}| set is not either JavaScript or CSS",
                    set
                )));
            }
        }
        Ok(())
    }

    pub fn is_release(&self) -> bool {
        self.target.is_release
    }

    pub fn build_path(&self) -> &Path {
        &self.target.build_path
    }

    /// Development and release build directories.
    pub fn all_build_paths(&self) -> [PathBuf; 2] {
        let mut dev = self.clone();
        dev.adapt_build_target(false);
        let mut release = self.clone();
        release.adapt_build_target(true);
        [dev.target.build_path, release.target.build_path]
    }

    /// Every style and script set, mapped to its fingerprinted file name
    /// (`css/main.css` becomes `css/main<buildAssetsSuffix>.css`).
    pub fn html_replace_sets(&self) -> IndexMap<String, String> {
        self.styles
            .sets
            .keys()
            .chain(self.scripts.sets.keys())
            .map(|set| (set.clone(), with_assets_suffix(set, &self.target.build_assets_suffix)))
            .collect()
    }

    pub fn contents_dir(&self) -> PathBuf {
        self.paths.source_root.join("contents")
    }

    pub fn masters_dir(&self) -> PathBuf {
        self.paths.source_root.join("masters")
    }

    /// Paths starting with `/` are relative to the tools root, others to the source root.
    pub fn resolve_structural_path(&self, path: &str) -> PathBuf {
        match path.strip_prefix('/') {
            Some(rest) => self.paths.tools_root.join(rest),
            None => self.paths.source_root.join(path),
        }
    }

    pub fn translations_file(&self) -> Option<PathBuf> {
        self.i18n.source.as_ref().map(|s| self.paths.root.join(s))
    }

    pub fn app_variables(&self) -> AppVariables {
        AppVariables {
            author: self.author.clone().unwrap_or_default(),
            is_release: self.target.is_release,
            build_date_time: self.build_date_time.clone(),
            build_user: self.build_user.clone(),
            root_url: self.root_url.clone(),
            app_name: self.app_name.clone(),
            app_version: self.app_version.clone(),
            generator_name: self
                .generator_name
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn with_assets_suffix(file: &str, suffix: &str) -> String {
    let name_start = file.rfind('/').map_or(0, |i| i + 1);
    match file[name_start..].rfind('.') {
        Some(dot) => {
            let (stem, extension) = file.split_at(name_start + dot);
            format!("{}{}{}", stem, suffix, extension)
        }
        None => file.to_string(),
    }
}

fn validate_sitemap_defaults(defaults: &XmlSitemapDefaults) -> Result<(), BuildError> {
    if let Some(frequency) = &defaults.default_change_frequency {
        if !CHANGE_FREQUENCIES.contains(&frequency.as_str()) {
            return Err(BuildError::configuration(format!(
                "Invalid default XML sitemap change frequency |{}|.",
                frequency
            )));
        }
    }
    if let Some(priority) = &defaults.default_priority {
        if !is_valid_priority(priority) {
            return Err(BuildError::configuration(format!(
                "Invalid default XML sitemap priority |{}|.",
                priority
            )));
        }
    }
    Ok(())
}

fn is_valid_priority(priority: &str) -> bool {
    if priority == "auto" {
        return true;
    }
    let Some((whole, fraction)) = priority.split_once('.') else {
        return false;
    };
    let shape_ok = (whole == "0" || whole == "1")
        && !fraction.is_empty()
        && fraction.chars().all(|c| c.is_ascii_digit());
    shape_ok && priority.parse::<f64>().map(|p| p <= 1.0).unwrap_or(false)
}

/// Locate the configuration file: explicit path, then `WEBGEN_CONFIG`, then a
/// single `webgen.yaml` below the current directory.
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf, BuildError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let pattern = format!("./**/{}", CONFIG_FILE_NAME);
    let found: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| BuildError::configuration(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .filter(|path| !path.components().any(|c| c.as_os_str() == "node_modules"))
        .collect();

    match found.len() {
        0 => Err(BuildError::configuration(
            "No YAML configuration option set or found.",
        )),
        1 => Ok(found.into_iter().next().unwrap_or_default()),
        _ => Err(BuildError::configuration(format!(
            "Found more than one {} below the current directory, use --config.",
            CONFIG_FILE_NAME
        ))),
    }
}
