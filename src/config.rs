//! Configuration management module
//!
//! Settings are layered lowest priority first: built-in defaults, an
//! optional YAML file, then the process environment (which `local.env`
//! may have seeded). Keys are the upper-case environment names; the YAML
//! file uses the same names in lower case.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "config/console-pilot.yaml";

/// How the app is picked from the console's app list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectBy {
    Title,
    Package,
}

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub app_name: String,
    pub default_locale: String,
    pub category: String,
    pub countries: Vec<String>,
    pub pricing_free: bool,
    pub select_by: SelectBy,
    pub package_name: String,
    pub email_contact: String,
    pub website: Option<String>,
    pub privacy_url: Option<String>,
    pub short_description: String,
    pub full_description: Option<String>,
    pub release_name: String,
    pub release_notes: String,
    pub aab_path: PathBuf,
    pub testers_emails: Vec<String>,
    pub wait_manual: bool,
    pub custom_domain: String,
    pub pages_repo_owner: Option<String>,
    pub pages_repo_name: Option<String>,
    pub session_file: PathBuf,
    pub github_session_file: PathBuf,
    pub console_url: String,
    pub headless: bool,
    pub artifact_dir: PathBuf,
    pub workflow_timeout_secs: u64,
    pub step_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Android News".to_string(),
            default_locale: "it-IT".to_string(),
            category: "News & Magazines".to_string(),
            countries: vec!["IT".to_string()],
            pricing_free: true,
            select_by: SelectBy::Title,
            package_name: "com.mucciologianfranco.android_news".to_string(),
            email_contact: "support@androidnews.app".to_string(),
            website: None,
            privacy_url: None,
            short_description: "Notizie Android in tempo reale dalle migliori fonti italiane"
                .to_string(),
            full_description: None,
            release_name: "Closed Test Build".to_string(),
            release_notes: "Prima build di test chiuso".to_string(),
            aab_path: PathBuf::from("../../build/app/outputs/bundle/release/app-release.aab"),
            testers_emails: Vec::new(),
            wait_manual: false,
            custom_domain: "androidnews.app".to_string(),
            pages_repo_owner: None,
            pages_repo_name: None,
            session_file: PathBuf::from("auth/state.json"),
            github_session_file: PathBuf::from("auth/github-state.json"),
            console_url: "https://play.google.com/console/u/0/developers".to_string(),
            headless: true,
            artifact_dir: PathBuf::from("playwright-results"),
            workflow_timeout_secs: 240,
            step_timeout_secs: 15,
        }
    }
}

impl Settings {
    /// Reads every known key from `raw`, keeping the default for absent or
    /// unparseable values.
    pub fn from_config(raw: &Config) -> Self {
        let d = Settings::default();
        let source = Source(raw);
        Self {
            app_name: source.text("app_name").unwrap_or(d.app_name),
            default_locale: source.text("default_locale").unwrap_or(d.default_locale),
            category: source.text("category").unwrap_or(d.category),
            countries: source.list("countries").unwrap_or(d.countries),
            pricing_free: source.flag("pricing_free", d.pricing_free),
            select_by: match source.text("select_by").as_deref() {
                None => d.select_by,
                Some(v) if v.eq_ignore_ascii_case("title") => SelectBy::Title,
                Some(v) if v.eq_ignore_ascii_case("package") => SelectBy::Package,
                Some(other) => {
                    warn!(key = "SELECT_BY", value = other, "expected title or package; using default");
                    d.select_by
                }
            },
            package_name: source.text("package_name").unwrap_or(d.package_name),
            email_contact: source.text("email_contact").unwrap_or(d.email_contact),
            website: source.text("website"),
            privacy_url: source.text("privacy_url"),
            short_description: source
                .text("short_description")
                .unwrap_or(d.short_description),
            full_description: source.text("full_description"),
            release_name: source.text("release_name").unwrap_or(d.release_name),
            release_notes: source.text("release_notes").unwrap_or(d.release_notes),
            aab_path: source.text("aab_path").map(PathBuf::from).unwrap_or(d.aab_path),
            testers_emails: source.list("testers_emails").unwrap_or(d.testers_emails),
            wait_manual: source.flag("wait_manual", d.wait_manual),
            custom_domain: source.text("custom_domain").unwrap_or(d.custom_domain),
            pages_repo_owner: source.text("pages_repo_owner"),
            pages_repo_name: source.text("pages_repo_name"),
            session_file: source
                .text("session_file")
                .map(PathBuf::from)
                .unwrap_or(d.session_file),
            github_session_file: source
                .text("github_session_file")
                .map(PathBuf::from)
                .unwrap_or(d.github_session_file),
            console_url: source.text("console_url").unwrap_or(d.console_url),
            headless: source.flag("headless", d.headless),
            artifact_dir: source
                .text("artifact_dir")
                .map(PathBuf::from)
                .unwrap_or(d.artifact_dir),
            workflow_timeout_secs: source
                .number("workflow_timeout_secs", d.workflow_timeout_secs),
            step_timeout_secs: source.number("step_timeout_secs", d.step_timeout_secs),
        }
    }

    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.workflow_timeout_secs)
    }

    /// Visibility timeout for element lookups.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Best-effort screenshot written when `task` fails.
    pub fn failure_screenshot(&self, task: &str) -> PathBuf {
        self.artifact_dir.join(format!("{task}-failure.png"))
    }

    pub fn asset_links_url(&self) -> String {
        format!("https://{}/.well-known/assetlinks.json", self.custom_domain)
    }
}

struct Source<'a>(&'a Config);

impl Source<'_> {
    fn text(&self, key: &str) -> Option<String> {
        let value = self.0.get_string(key).ok()?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        let items: Vec<String> = match self.0.get_array(key) {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| v.into_string().ok())
                .collect(),
            Err(_) => self
                .text(key)?
                .split(',')
                .map(str::to_string)
                .collect(),
        };
        let items: Vec<String> = items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Some(items)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.text(key) else {
            return default;
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => {
                warn!(key = %key.to_ascii_uppercase(), value = %raw, default, "not a boolean; using default");
                default
            }
        }
    }

    fn number(&self, key: &str, default: u64) -> u64 {
        let Some(raw) = self.text(key) else {
            return default;
        };
        raw.parse().unwrap_or_else(|_| {
            warn!(key = %key.to_ascii_uppercase(), value = %raw, default, "not a number; using default");
            default
        })
    }
}

/// Picks the config file: the explicit path, `./config/console-pilot.yaml`,
/// or the per-user config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("console-pilot").join("config.yaml");
    user.exists().then_some(user)
}

/// Loads settings from the optional file and the environment.
///
/// An explicit file that does not exist is an error; the implicit ones are
/// optional.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let mut builder = Config::builder();
    if let Some(path) = resolve_config_path(explicit) {
        debug!(path = %path.display(), "reading configuration file");
        builder = builder.add_source(File::from(path.as_path()).required(explicit.is_some()));
    }
    let raw = builder
        .add_source(Environment::default())
        .build()
        .context("Failed to build configuration")?;
    Ok(Settings::from_config(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn raw(pairs: &[(&str, &str)]) -> Config {
        let mut builder = Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = Settings::from_config(&raw(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.step_timeout(), Duration::from_secs(15));
        assert_eq!(
            settings.asset_links_url(),
            "https://androidnews.app/.well-known/assetlinks.json"
        );
    }

    #[test]
    fn lists_split_on_commas_and_drop_blanks() {
        let settings = Settings::from_config(&raw(&[
            ("countries", "IT, DE,,FR "),
            ("testers_emails", "a@example.com,b@example.com"),
        ]));
        assert_eq!(settings.countries, vec!["IT", "DE", "FR"]);
        assert_eq!(settings.testers_emails.len(), 2);
    }

    #[test]
    fn bad_scalars_fall_back_to_defaults() {
        let settings = Settings::from_config(&raw(&[
            ("pricing_free", "maybe"),
            ("workflow_timeout_secs", "soon"),
            ("select_by", "icon"),
            ("wait_manual", "yes"),
        ]));
        assert!(settings.pricing_free);
        assert_eq!(settings.workflow_timeout_secs, 240);
        assert_eq!(settings.select_by, SelectBy::Title);
        assert!(settings.wait_manual);
    }

    #[test]
    fn blank_optional_values_are_unset() {
        let settings = Settings::from_config(&raw(&[("website", "  "), ("privacy_url", "")]));
        assert_eq!(settings.website, None);
        assert_eq!(settings.privacy_url, None);
    }

    #[test]
    #[serial]
    fn environment_overrides_the_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "app_name: From File\ncategory: Tools\ncountries: [IT, ES]").unwrap();

        std::env::set_var("APP_NAME", "From Env");
        let settings = load_settings(Some(file.path()));
        std::env::remove_var("APP_NAME");

        let settings = settings.unwrap();
        assert_eq!(settings.app_name, "From Env");
        assert_eq!(settings.category, "Tools");
        assert_eq!(settings.countries, vec!["IT", "ES"]);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(load_settings(Some(Path::new("/no/such/console-pilot.yaml"))).is_err());
    }
}
