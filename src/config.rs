use crate::error::{Error, Result};
use crate::Options;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const FILE_PREFIX: &str = "file://";

/// How long the browser connection may stay silent on top of the longest
/// expected wait (navigation timeout plus delay).
const IDLE_GRACE: Duration = Duration::from_secs(30);

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// The `load` event fired
    #[value(name = "load")]
    Load,
    /// The `DOMContentLoaded` event fired
    #[value(name = "domcontentloaded")]
    DomContentLoaded,
    /// No network connections for at least 500 ms
    #[value(name = "networkidle0")]
    NetworkIdle0,
    /// At most two network connections for at least 500 ms
    #[value(name = "networkidle2")]
    NetworkIdle2,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Margin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
}

impl Margin {
    /// `None` unless at least one side is set.
    fn from_sides(
        top: Option<&String>,
        right: Option<&String>,
        bottom: Option<&String>,
        left: Option<&String>,
    ) -> Option<Margin> {
        let margin = Margin {
            top: top.cloned(),
            right: right.cloned(),
            bottom: bottom.cloned(),
            left: left.cloned(),
        };
        if margin == Margin::default() {
            None
        } else {
            Some(margin)
        }
    }
}

/// Fully resolved rendering options. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub scale: f64,
    pub display_header_footer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_template: Option<String>,
    pub print_background: bool,
    pub landscape: bool,
    pub page_ranges: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<Margin>,
    pub wait_until: WaitUntil,
    #[serde(rename = "delay")]
    pub delay_ms: u64,
    pub emulate_media_type: String,
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    pub debug: bool,
}

impl RenderConfig {
    pub fn build(opts: &Options) -> Result<RenderConfig> {
        Ok(RenderConfig {
            path: opts.path.clone(),
            scale: opts.scale,
            display_header_footer: opts.display_header_footer,
            header_template: resolve_template(opts.header_template.as_deref())?,
            footer_template: resolve_template(opts.footer_template.as_deref())?,
            print_background: opts.print_background,
            landscape: opts.landscape,
            page_ranges: opts.page_ranges.clone().unwrap_or_default(),
            format: opts.format.clone(),
            width: opts.width.clone(),
            height: opts.height.clone(),
            margin: Margin::from_sides(
                opts.margin_top.as_ref(),
                opts.margin_right.as_ref(),
                opts.margin_bottom.as_ref(),
                opts.margin_left.as_ref(),
            ),
            wait_until: opts.wait_until,
            delay_ms: opts.delay,
            emulate_media_type: opts.emulate_media_type.clone(),
            timeout_ms: opts.timeout,
            debug: opts.debug,
        })
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl fmt::Display for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// `file://<path>` values are replaced by the file's contents, anything
/// else is inline HTML.
fn resolve_template(value: Option<&str>) -> Result<Option<String>> {
    let value = match value {
        Some(value) => value,
        None => return Ok(None),
    };

    match value.strip_prefix(FILE_PREFIX) {
        Some(path) => fs::read_to_string(path)
            .map(Some)
            .map_err(|source| Error::TemplateRead {
                path: PathBuf::from(path),
                source,
            }),
        None => Ok(Some(value.to_string())),
    }
}

/// Browser process settings that are not part of the PDF options.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    pub executable: Option<PathBuf>,
    pub debug: bool,
    pub navigation_timeout: Duration,
    pub idle_timeout: Duration,
}

impl LaunchConfig {
    pub fn build(opts: &Options) -> LaunchConfig {
        let navigation_timeout = Duration::from_millis(opts.timeout);
        LaunchConfig {
            executable: opts.chrome.clone(),
            debug: opts.debug,
            navigation_timeout,
            idle_timeout: IDLE_GRACE + navigation_timeout + Duration::from_millis(opts.delay),
        }
    }
}
