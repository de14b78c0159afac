//! Control adapter backed by a Chromium page over CDP.
//!
//! Both regions are located once when a session opens and tagged with data
//! attributes; later calls address the tags. A `MutationObserver` on the
//! output region feeds [`ControlAdapter::output_revision`].

use super::{ControlAdapter, SessionFactory};
use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig as LaunchConfig, Page};
use futures::StreamExt as _;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use transcheck_core::config::SelectorConfig;
use transcheck_core::{Error, HarnessConfig, NameMatch, Result};

/// Attribute placed on the located input control.
const INPUT_MARKER: &str = "[data-transcheck-input]";

/// Elements that can take typed text; never treated as the output region.
const EDITABLE: &str =
    "textarea, input:not([type=hidden]), [role=textbox], [contenteditable]:not([contenteditable=false])";

/// Attempts to see an empty input after clearing.
const CLEAR_ATTEMPTS: usize = 5;

/// Pause between clear attempts.
const CLEAR_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Lists the accessible names of all editable controls, tags the output
/// region and installs the output observer.
const LOCATE_CONTROLS: &str = r#"function (editable, selector) {
  const normalize = (text) => (text || '').replace(/\s+/g, ' ').trim();
  const accessibleName = (el) => {
    const labelledBy = el.getAttribute('aria-labelledby');
    if (labelledBy) {
      const text = labelledBy.split(/\s+/)
        .map((id) => document.getElementById(id))
        .filter(Boolean)
        .map((node) => node.textContent)
        .join(' ');
      if (normalize(text)) return normalize(text);
    }
    if (normalize(el.getAttribute('aria-label'))) return normalize(el.getAttribute('aria-label'));
    if (el.labels && el.labels.length) {
      const text = Array.from(el.labels).map((label) => label.textContent).join(' ');
      if (normalize(text)) return normalize(text);
    }
    return normalize(el.getAttribute('placeholder') || el.getAttribute('title'));
  };

  document.querySelectorAll('[data-transcheck-input]').forEach((el) => el.removeAttribute('data-transcheck-input'));
  document.querySelectorAll('[data-transcheck-output]').forEach((el) => el.removeAttribute('data-transcheck-output'));

  const names = Array.from(document.querySelectorAll(editable)).map(accessibleName);

  const outputs = Array.from(document.querySelectorAll(selector))
    .filter((el) => !el.matches(editable) && !el.querySelector(editable));
  if (outputs.length > 0) {
    outputs[0].setAttribute('data-transcheck-output', '');
    if (window.__transcheckObserver) window.__transcheckObserver.disconnect();
    window.__transcheckRevision = 0;
    window.__transcheckObserver = new MutationObserver(() => { window.__transcheckRevision += 1; });
    window.__transcheckObserver.observe(outputs[0], { childList: true, subtree: true, characterData: true });
  }
  return { names, outputs: outputs.length };
}"#;

/// Tags the editable control at `index` in document order as the input.
const TAG_INPUT: &str = r#"function (editable, index) {
  const el = Array.from(document.querySelectorAll(editable))[Number(index)];
  if (!el) return { found: false, value: '' };
  el.setAttribute('data-transcheck-input', '');
  return { found: true, value: el.isContentEditable ? el.textContent : el.value };
}"#;

/// Replaces the input value so that framework listeners see the change.
const WRITE_INPUT: &str = r#"function (text) {
  const el = document.querySelector('[data-transcheck-input]');
  if (!el) return { found: false, value: '' };
  el.focus();
  if (el.isContentEditable) {
    el.textContent = text;
  } else {
    const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, text);
  }
  el.dispatchEvent(new Event('input', { bubbles: true }));
  el.dispatchEvent(new Event('change', { bubbles: true }));
  return { found: true, value: el.isContentEditable ? el.textContent : el.value };
}"#;

/// Focuses the input with the caret after its last character.
const FOCUS_END: &str = r#"function () {
  const el = document.querySelector('[data-transcheck-input]');
  if (!el) return { found: false, value: '' };
  el.focus();
  if (el.isContentEditable) {
    const range = document.createRange();
    range.selectNodeContents(el);
    range.collapse(false);
    const selection = window.getSelection();
    selection.removeAllRanges();
    selection.addRange(range);
    return { found: true, value: el.textContent };
  }
  el.setSelectionRange(el.value.length, el.value.length);
  return { found: true, value: el.value };
}"#;

/// Reads the tagged output, re-locating it if the page replaced the node.
const READ_OUTPUT: &str = r#"function (editable, selector) {
  let el = document.querySelector('[data-transcheck-output]');
  if (!el) {
    el = Array.from(document.querySelectorAll(selector))
      .find((node) => !node.matches(editable) && !node.querySelector(editable)) || null;
  }
  return { text: el ? (el.textContent || '') : '', revision: window.__transcheckRevision || 0 };
}"#;

#[derive(Debug, Deserialize)]
struct Located {
    names: Vec<String>,
    outputs: usize,
}

#[derive(Debug, Deserialize)]
struct InputState {
    found: bool,
    value: String,
}

#[derive(Debug, Deserialize)]
struct OutputState {
    text: String,
    revision: u64,
}

fn session_error(err: CdpError) -> Error {
    Error::Session(err.to_string())
}

/// Render a call of `function` with JSON-encoded arguments.
fn call(function: &str, args: &[&str]) -> Result<String> {
    let encoded = args
        .iter()
        .map(serde_json::to_string)
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(format!("({function})({})", encoded.join(", ")))
}

/// Positions of the controls in `names` that satisfy `wanted` under `rule`.
fn matching_inputs(names: &[String], wanted: &str, rule: NameMatch) -> Vec<usize> {
    names
        .iter()
        .enumerate()
        .filter(|(_, name)| rule.matches(wanted, name))
        .map(|(index, _)| index)
        .collect()
}

/// One translator page.
#[derive(Debug)]
pub struct ChromiumAdapter {
    page: Page,
    input_name: String,
    output_selector: String,
}

impl ChromiumAdapter {
    /// Locate both regions on an already loaded page.
    ///
    /// # Errors
    /// `ControlNotFound` if the input is missing or ambiguous, or no output matches
    pub async fn attach(page: Page, selectors: &SelectorConfig) -> Result<Self> {
        let adapter = Self {
            page,
            input_name: selectors.input_accessible_name.clone(),
            output_selector: selectors.output_selector.clone(),
        };
        let located: Located = adapter
            .evaluate(call(LOCATE_CONTROLS, &[EDITABLE, &adapter.output_selector])?)
            .await?;
        let matching = matching_inputs(
            &located.names,
            &adapter.input_name,
            selectors.input_name_match,
        );
        tracing::debug!(
            "Found {} editable control(s), {} named {:?}, and {} output(s)",
            located.names.len(),
            matching.len(),
            adapter.input_name,
            located.outputs
        );

        match matching.as_slice() {
            [] => {
                return Err(Error::ControlNotFound(format!(
                    "no textbox named {:?} among {:?}",
                    adapter.input_name, located.names
                )));
            }
            [index] => {
                let tagged: InputState = adapter
                    .evaluate(call(TAG_INPUT, &[EDITABLE, &index.to_string()])?)
                    .await?;
                if !tagged.found {
                    return Err(adapter.input_gone());
                }
            }
            several => {
                return Err(Error::ControlNotFound(format!(
                    "{} textboxes named {:?}",
                    several.len(),
                    adapter.input_name
                )));
            }
        }
        if located.outputs == 0 {
            return Err(Error::ControlNotFound(format!(
                "no output region matches {:?}",
                adapter.output_selector
            )));
        }
        Ok(adapter)
    }

    async fn evaluate<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(session_error)?
            .into_value()
            .map_err(|err| Error::Session(format!("Unexpected script result: {err}")))
    }

    async fn write_input(&self, text: &str) -> Result<String> {
        let state: InputState = self.evaluate(call(WRITE_INPUT, &[text])?).await?;
        if state.found {
            Ok(state.value)
        } else {
            Err(self.input_gone())
        }
    }

    async fn read_state(&self) -> Result<OutputState> {
        self.evaluate(call(READ_OUTPUT, &[EDITABLE, &self.output_selector])?)
            .await
    }

    fn input_gone(&self) -> Error {
        Error::ControlNotFound(format!(
            "textbox named {:?} is no longer on the page",
            self.input_name
        ))
    }
}

#[async_trait]
impl ControlAdapter for ChromiumAdapter {
    async fn clear(&self) -> Result<()> {
        for attempt in 1..=CLEAR_ATTEMPTS {
            if self.write_input("").await?.is_empty() {
                return Ok(());
            }
            tracing::debug!("Input not empty after clear attempt {attempt}");
            sleep(CLEAR_RETRY_DELAY).await;
        }
        Err(Error::Session(format!(
            "input still non-empty after {CLEAR_ATTEMPTS} clear attempts"
        )))
    }

    async fn set_text(&self, text: &str) -> Result<()> {
        let value = self.write_input(text).await?;
        if value != text {
            tracing::warn!("Input holds {value:?} after setting {text:?}");
        }
        Ok(())
    }

    async fn type_incremental(&self, text: &str, per_char_delay: Duration) -> Result<()> {
        let focused: InputState = self.evaluate(call(FOCUS_END, &[])?).await?;
        if !focused.found {
            return Err(self.input_gone());
        }
        let input = self
            .page
            .find_element(INPUT_MARKER)
            .await
            .map_err(|_err| self.input_gone())?;

        for (index, character) in text.chars().enumerate() {
            if index > 0 {
                sleep(per_char_delay).await;
            }
            input
                .type_str(character.to_string())
                .await
                .map_err(session_error)?;
        }
        Ok(())
    }

    async fn read_output(&self) -> Result<String> {
        Ok(self.read_state().await?.text.trim().to_owned())
    }

    async fn output_revision(&self) -> Result<Option<u64>> {
        Ok(Some(self.read_state().await?.revision))
    }
}

/// Launches one browser and opens a fresh page per session.
pub struct ChromiumSessionFactory {
    browser: Browser,
    handler: JoinHandle<()>,
    site_url: String,
    selectors: SelectorConfig,
    page_load_delay: Duration,
    navigation_timeout: Duration,
}

impl fmt::Debug for ChromiumSessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f
            .debug_struct("ChromiumSessionFactory")
            .field("site_url", &self.site_url)
            .field("selectors", &self.selectors)
            .finish_non_exhaustive()
    }
}

impl ChromiumSessionFactory {
    /// Launch Chromium as configured.
    ///
    /// # Errors
    /// `Session` if the browser cannot be started
    pub async fn launch(config: &HarnessConfig) -> Result<Self> {
        let mut builder = LaunchConfig::builder().request_timeout(config.browser.navigation_timeout());
        if !config.browser.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.browser.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        let launch_config = builder.build().map_err(Error::Session)?;

        let (browser, mut events) = Browser::launch(launch_config)
            .await
            .map_err(session_error)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(err) = event {
                    tracing::debug!("CDP handler error: {err}");
                }
            }
        });
        tracing::info!(
            "Launched Chromium ({})",
            if config.browser.headless { "headless" } else { "headed" }
        );

        Ok(Self {
            browser,
            handler,
            site_url: config.site_url.clone(),
            selectors: config.selectors.clone(),
            page_load_delay: config.timing.page_load_delay(),
            navigation_timeout: config.browser.navigation_timeout(),
        })
    }

    /// Close the browser and stop its event handler.
    ///
    /// # Errors
    /// `Session` if the browser does not close cleanly
    pub async fn shutdown(mut self) -> Result<()> {
        let closed = self.browser.close().await.map_err(session_error);
        if let Err(err) = self.browser.wait().await {
            tracing::debug!("Waiting for Chromium to exit failed: {err}");
        }
        self.handler.abort();
        closed.map(|_closed| ())
    }

    async fn load_page(&self) -> Result<Page> {
        let loading = async {
            let page = self.browser.new_page(self.site_url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(page)
        };
        match timeout(self.navigation_timeout, loading).await {
            Ok(loaded) => loaded.map_err(session_error),
            Err(_elapsed) => Err(Error::Session(format!(
                "{} did not load within {}ms",
                self.site_url,
                self.navigation_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    type Adapter = ChromiumAdapter;

    async fn open_session(&self) -> Result<ChromiumAdapter> {
        let page = self.load_page().await?;
        sleep(self.page_load_delay).await;

        match ChromiumAdapter::attach(page.clone(), &self.selectors).await {
            Ok(adapter) => Ok(adapter),
            Err(err) => {
                if let Err(close_err) = page.close().await {
                    tracing::debug!("Closing page after failed attach: {close_err}");
                }
                Err(err)
            }
        }
    }

    async fn close_session(&self, adapter: ChromiumAdapter) -> Result<()> {
        adapter.page.close().await.map_err(session_error)
    }
}
