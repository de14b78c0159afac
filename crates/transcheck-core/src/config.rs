//! Harness configuration.
//!
//! Defaults are layered under an optional TOML file and `TRANSCHECK_*`
//! environment variables. The resulting value is passed explicitly into the
//! harness; nothing here is process-wide state.

use crate::error::{Error, Result};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default address of the translator under test.
pub const DEFAULT_SITE_URL: &str = "https://www.swifttranslator.com/";

/// Default accessible name of the input textbox.
pub const DEFAULT_INPUT_NAME: &str = "Input Your Singlish Text Here.";

/// Default selector matching the output container(s).
pub const DEFAULT_OUTPUT_SELECTOR: &str =
    "div.w-full.h-80.p-3.rounded-lg.ring-1.ring-slate-300.whitespace-pre-wrap";

/// Shortest quiet window the quiescent strategy accepts.
///
/// The translator can hold a provisional rendering for most of a second
/// before its debounce fires; a shorter window could end in that gap.
pub const MIN_QUIET_WINDOW_MS: u64 = 1_000;

/// Prefix of environment variables that override configuration values.
const ENV_PREFIX: &str = "TRANSCHECK_";

/// Complete harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Address of the translator page
    pub site_url: String,
    /// Waits, delays and budgets
    pub timing: TimingConfig,
    /// How the two UI regions are located
    pub selectors: SelectorConfig,
    /// Browser launch options
    pub browser: BrowserConfig,
    /// Runner options
    pub run: RunConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_owned(),
            timing: TimingConfig::default(),
            selectors: SelectorConfig::default(),
            browser: BrowserConfig::default(),
            run: RunConfig::default(),
        }
    }
}

/// How the settle phase decides the output is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleStrategy {
    /// Sleep for the whole settle delay.
    #[default]
    Fixed,
    /// Return once the output has been unchanged for the quiet window, capped by the settle delay.
    Quiescent,
}

/// Waits, delays and budgets, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Cadence of output polling
    pub poll_interval_ms: u64,
    /// Budget for the output to become non-empty
    pub convergence_timeout_ms: u64,
    /// Margin after first non-empty output
    pub settle_delay_ms: u64,
    /// Pause between consecutive cases
    pub inter_case_delay_ms: u64,
    /// Delay between typed characters
    pub keystroke_delay_ms: u64,
    /// Extra wait after the page reports loaded
    pub page_load_delay_ms: u64,
    /// Wait after clearing the input
    pub after_clear_delay_ms: u64,
    /// Wait before checking the provisional output of a partial input
    pub partial_observation_delay_ms: u64,
    /// Settle phase behavior
    pub settle_strategy: SettleStrategy,
    /// Required stability window for the quiescent strategy
    pub quiet_window_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            convergence_timeout_ms: 30_000,
            settle_delay_ms: 3_000,
            inter_case_delay_ms: 2_000,
            keystroke_delay_ms: 150,
            page_load_delay_ms: 2_000,
            after_clear_delay_ms: 1_000,
            partial_observation_delay_ms: 1_500,
            settle_strategy: SettleStrategy::Fixed,
            quiet_window_ms: MIN_QUIET_WINDOW_MS,
        }
    }
}

impl TimingConfig {
    /// Polling cadence.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Budget for first non-empty output.
    pub fn convergence_timeout(&self) -> Duration {
        Duration::from_millis(self.convergence_timeout_ms)
    }

    /// Settle margin.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Pause between cases.
    pub fn inter_case_delay(&self) -> Duration {
        Duration::from_millis(self.inter_case_delay_ms)
    }

    /// Delay between typed characters.
    pub fn keystroke_delay(&self) -> Duration {
        Duration::from_millis(self.keystroke_delay_ms)
    }

    /// Extra wait after page load.
    pub fn page_load_delay(&self) -> Duration {
        Duration::from_millis(self.page_load_delay_ms)
    }

    /// Wait after clearing.
    pub fn after_clear_delay(&self) -> Duration {
        Duration::from_millis(self.after_clear_delay_ms)
    }

    /// Wait before the intermediate observation.
    pub fn partial_observation_delay(&self) -> Duration {
        Duration::from_millis(self.partial_observation_delay_ms)
    }

    /// Quiet window for the quiescent settle strategy.
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }
}

/// How a textbox's accessible name is compared with the configured name.
///
/// Both sides have runs of whitespace collapsed and ends trimmed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatch {
    /// The configured name occurs anywhere in the accessible name, ignoring case.
    #[default]
    Contains,
    /// The accessible name equals the configured name exactly.
    Exact,
}

impl NameMatch {
    /// Whether a control named `candidate` satisfies the configured name `wanted`.
    pub fn matches(self, wanted: &str, candidate: &str) -> bool {
        let wanted_name = normalize_whitespace(wanted);
        let candidate_name = normalize_whitespace(candidate);
        match self {
            Self::Contains => candidate_name
                .to_lowercase()
                .contains(&wanted_name.to_lowercase()),
            Self::Exact => candidate_name == wanted_name,
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// How the input and output regions are located on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectorConfig {
    /// Accessible name of the input textbox
    pub input_accessible_name: String,
    /// Comparison used for the accessible name
    pub input_name_match: NameMatch,
    /// CSS selector of the output container(s)
    pub output_selector: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            input_accessible_name: DEFAULT_INPUT_NAME.to_owned(),
            input_name_match: NameMatch::Contains,
            output_selector: DEFAULT_OUTPUT_SELECTOR.to_owned(),
        }
    }
}

/// Browser launch options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Chrome/Chromium binary; auto-detected when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<PathBuf>,
    /// Budget for page navigation and protocol requests
    pub navigation_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            navigation_timeout_ms: 30_000,
        }
    }
}

impl BrowserConfig {
    /// Navigation budget.
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

/// Runner options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of cases run concurrently, each in its own session
    pub parallelism: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { parallelism: 1 }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults, then the optional file, then environment overrides.
    ///
    /// # Errors
    /// Returns error if the file is unreadable or an override does not parse
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `TRANSCHECK_*` overrides through `lookup`.
    ///
    /// # Errors
    /// Returns error if an override value does not parse
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(url) = var("SITE_URL") {
            self.site_url = url;
        }
        override_number(&var, "POLL_INTERVAL_MS", &mut self.timing.poll_interval_ms)?;
        override_number(
            &var,
            "CONVERGENCE_TIMEOUT_MS",
            &mut self.timing.convergence_timeout_ms,
        )?;
        override_number(&var, "SETTLE_DELAY_MS", &mut self.timing.settle_delay_ms)?;
        override_number(
            &var,
            "INTER_CASE_DELAY_MS",
            &mut self.timing.inter_case_delay_ms,
        )?;
        override_number(
            &var,
            "KEYSTROKE_DELAY_MS",
            &mut self.timing.keystroke_delay_ms,
        )?;
        override_number(&var, "PARALLELISM", &mut self.run.parallelism)?;

        if let Some(raw) = var("HEADLESS") {
            self.browser.headless = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(Error::Config(format!(
                        "{ENV_PREFIX}HEADLESS must be a boolean, got {other:?}"
                    )));
                }
            };
        }
        Ok(())
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns error describing the first violated constraint
    pub fn validate(&self) -> Result<()> {
        if !(self.site_url.starts_with("http://") || self.site_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "site_url must use http or https: {}",
                self.site_url
            )));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(Error::Config(
                "poll_interval_ms must be greater than zero".to_owned(),
            ));
        }
        if self.timing.convergence_timeout_ms < self.timing.poll_interval_ms {
            return Err(Error::Config(
                "convergence_timeout_ms must be at least poll_interval_ms".to_owned(),
            ));
        }
        if self.run.parallelism == 0 {
            return Err(Error::Config("parallelism must be at least 1".to_owned()));
        }
        if self.timing.settle_strategy == SettleStrategy::Quiescent {
            if self.timing.quiet_window_ms < MIN_QUIET_WINDOW_MS {
                return Err(Error::Config(format!(
                    "quiet_window_ms must be at least {MIN_QUIET_WINDOW_MS}"
                )));
            }
            if self.timing.quiet_window_ms > self.timing.settle_delay_ms {
                return Err(Error::Config(
                    "quiet_window_ms must not exceed settle_delay_ms".to_owned(),
                ));
            }
        }
        if self.selectors.input_accessible_name.trim().is_empty() {
            return Err(Error::Config(
                "input_accessible_name must not be empty".to_owned(),
            ));
        }
        if self.selectors.output_selector.trim().is_empty() {
            return Err(Error::Config("output_selector must not be empty".to_owned()));
        }
        Ok(())
    }

    /// Render as TOML.
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| Error::Config(format!("Failed to serialize configuration: {err}")))
    }
}

/// Parse an optional numeric override into `target`.
fn override_number<T, F>(var: &F, name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var(name) {
        *target = raw.trim().parse().map_err(|_err| {
            Error::Config(format!("{ENV_PREFIX}{name} must be a number, got {raw:?}"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_reference_timings() {
        let config = HarnessConfig::default();
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
        assert_eq!(config.timing.settle_delay_ms, 3_000);
        assert_eq!(config.timing.after_clear_delay_ms, 1_000);
        assert_eq!(config.timing.inter_case_delay_ms, 2_000);
        assert_eq!(config.timing.keystroke_delay_ms, 150);
        assert_eq!(config.timing.settle_strategy, SettleStrategy::Fixed);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("transcheck.toml");
        fs::write(
            &path,
            "site_url = \"http://localhost:8080/\"\n\n[timing]\nsettle_delay_ms = 2500\nsettle_strategy = \"quiescent\"\nquiet_window_ms = 1200\n",
        )
        .expect("Failed to write config");

        let config = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(config.site_url, "http://localhost:8080/");
        assert_eq!(config.timing.settle_delay_ms, 2_500);
        assert_eq!(config.timing.quiet_window_ms, 1_200);
        assert_eq!(config.timing.settle_strategy, SettleStrategy::Quiescent);
        assert_eq!(config.timing.poll_interval_ms, 100);
        assert_eq!(config.selectors, SelectorConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("bad.toml");
        fs::write(&path, "[timing]\nsettle_dely_ms = 5\n").expect("Failed to write config");

        let error = HarnessConfig::from_file(&path).unwrap_err();
        assert!(matches!(error, Error::Toml(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = HarnessConfig::default();
        config
            .apply_env_overrides(lookup_from(&[
                ("TRANSCHECK_SITE_URL", "http://127.0.0.1:3000"),
                ("TRANSCHECK_POLL_INTERVAL_MS", " 50 "),
                ("TRANSCHECK_HEADLESS", "false"),
                ("TRANSCHECK_PARALLELISM", "4"),
            ]))
            .unwrap();

        assert_eq!(config.site_url, "http://127.0.0.1:3000");
        assert_eq!(config.timing.poll_interval_ms, 50);
        assert!(!config.browser.headless);
        assert_eq!(config.run.parallelism, 4);
        assert_eq!(config.timing.settle_delay_ms, 3_000);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = HarnessConfig::default();
        let error = config
            .apply_env_overrides(lookup_from(&[("TRANSCHECK_SETTLE_DELAY_MS", "soon")]))
            .unwrap_err();
        assert!(error.to_string().contains("TRANSCHECK_SETTLE_DELAY_MS"));

        let error = config
            .apply_env_overrides(lookup_from(&[("TRANSCHECK_HEADLESS", "maybe")]))
            .unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = HarnessConfig::default();
        config.timing.poll_interval_ms = 0;
        config.validate().unwrap_err();

        let mut config = HarnessConfig::default();
        config.site_url = "ftp://example.com".to_owned();
        config.validate().unwrap_err();

        let mut config = HarnessConfig::default();
        config.run.parallelism = 0;
        config.validate().unwrap_err();

        let mut config = HarnessConfig::default();
        config.timing.settle_strategy = SettleStrategy::Quiescent;
        config.timing.quiet_window_ms = config.timing.settle_delay_ms + 1;
        config.validate().unwrap_err();

        let mut config = HarnessConfig::default();
        config.selectors.input_accessible_name = "  ".to_owned();
        config.validate().unwrap_err();
    }

    #[test]
    fn test_quiescent_defaults_validate_and_short_windows_do_not() {
        let mut config = HarnessConfig::default();
        config.timing.settle_strategy = SettleStrategy::Quiescent;
        config.validate().unwrap();
        assert_eq!(config.timing.quiet_window_ms, MIN_QUIET_WINDOW_MS);

        config.timing.quiet_window_ms = 500;
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("quiet_window_ms must be at least"));
    }

    #[test]
    fn test_name_match_contains_ignores_case_and_spacing() {
        let wanted = "Input Your Singlish Text Here.";
        assert!(NameMatch::Contains.matches(wanted, "Input Your Singlish Text Here."));
        assert!(NameMatch::Contains.matches(wanted, "input your  singlish\ntext here."));
        assert!(NameMatch::Contains.matches(wanted, "Input Your Singlish Text Here. (max 500)"));
        assert!(!NameMatch::Contains.matches(wanted, "Sinhala output"));
    }

    #[test]
    fn test_name_match_exact_is_strict() {
        let wanted = "Input Your Singlish Text Here.";
        assert!(NameMatch::Exact.matches(wanted, " Input Your  Singlish Text Here. "));
        assert!(!NameMatch::Exact.matches(wanted, "input your singlish text here."));
        assert!(!NameMatch::Exact.matches(wanted, "Input Your Singlish Text Here. (max 500)"));
    }

    #[test]
    fn test_name_match_from_toml() {
        let config: HarnessConfig =
            toml::from_str("[selectors]\ninput_name_match = \"exact\"\n").unwrap();
        assert_eq!(config.selectors.input_name_match, NameMatch::Exact);
        assert_eq!(
            HarnessConfig::default().selectors.input_name_match,
            NameMatch::Contains
        );
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let config = HarnessConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[timing]"));
        let parsed: HarnessConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
