use crate::config::{LaunchConfig, RenderConfig, WaitUntil};
use crate::error::{Error, Result};
use crate::session::Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::util::Wait;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

const PX_PER_INCH: f64 = 96.0;

/// CSS units as pixels per unit.
const UNITS: [(&str, f64); 4] = [
    ("px", 1.0),
    ("in", PX_PER_INCH),
    ("cm", 37.8),
    ("mm", 3.78),
];

/// Paper formats as (width, height) in inches.
const PAPER_FORMATS: [(&str, f64, f64); 11] = [
    ("letter", 8.5, 11.0),
    ("legal", 8.5, 14.0),
    ("tabloid", 11.0, 17.0),
    ("ledger", 17.0, 11.0),
    ("a0", 33.1, 46.8),
    ("a1", 23.4, 33.1),
    ("a2", 16.54, 23.4),
    ("a3", 11.7, 16.54),
    ("a4", 8.27, 11.7),
    ("a5", 5.83, 8.27),
    ("a6", 4.13, 5.83),
];

/// Headless Chrome with one tab.
pub struct ChromeEngine {
    browser: Browser,
    tab: Arc<Tab>,
    launch: LaunchConfig,
}

impl Engine for ChromeEngine {
    fn launch(config: &LaunchConfig) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .enable_logging(config.debug)
            .path(config.executable.clone())
            .idle_browser_timeout(config.idle_timeout)
            .build()
            .map_err(|e| Error::Launch(e.to_string()))?;

        match &config.executable {
            Some(path) => debug!("Launching {}", path.display()),
            None => debug!("Launching default Chrome"),
        }
        let browser = Browser::new(options).map_err(|e| Error::Launch(format!("{e:#}")))?;
        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to open tab: {e:#}")))?;
        tab.set_default_timeout(config.navigation_timeout);

        Ok(ChromeEngine {
            browser,
            tab,
            launch: config.clone(),
        })
    }

    fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> Result<()> {
        let navigation_error = |e: anyhow::Error| Error::Navigation {
            url: url.to_string(),
            reason: format!("{e:#}"),
        };

        let reached = self.track_lifecycle().map_err(navigation_error)?;
        let event = lifecycle_event(wait_until);

        // Drop anything the blank start page reported.
        reached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.tab.navigate_to(url).map_err(navigation_error)?;

        Wait::with_timeout(self.launch.navigation_timeout)
            .until(|| {
                let reached = reached.lock().unwrap_or_else(PoisonError::into_inner);
                reached.contains(event).then_some(())
            })
            .map_err(|_| Error::Navigation {
                url: url.to_string(),
                reason: format!(
                    "`{event}` not reached within {} ms",
                    self.launch.navigation_timeout.as_millis()
                ),
            })
    }

    fn emulate_media_type(&mut self, media_type: &str) -> Result<()> {
        self.tab
            .call_method(Emulation::SetEmulatedMedia {
                media: Some(media_type.to_string()),
                features: None,
            })
            .map(|_| ())
            .map_err(|e| Error::Emulation(format!("{e:#}")))
    }

    fn print_to_pdf(&mut self, config: &RenderConfig) -> Result<Vec<u8>> {
        let options = pdf_options(config)?;
        self.tab
            .print_to_pdf(Some(options))
            .map_err(|e| Error::Render(format!("{e:#}")))
    }

    fn close(self) -> Result<()> {
        let closed = self.tab.close(false);
        // Dropping the browser kills the Chrome process.
        drop(self.browser);
        closed
            .map(|_| ())
            .map_err(|e| Error::Close(format!("{e:#}")))
    }
}

impl ChromeEngine {
    /// Collects the lifecycle events seen for the current document of the
    /// main frame. A new document (`init`) starts a fresh set.
    fn track_lifecycle(&self) -> anyhow::Result<Arc<Mutex<HashSet<String>>>> {
        self.tab.call_method(Page::SetLifecycleEventsEnabled { enabled: true })?;

        let reached = Arc::new(Mutex::new(HashSet::new()));
        let seen = Arc::clone(&reached);
        let main_frame = self.tab.get_target_id().clone();

        self.tab.add_event_listener(Arc::new(move |event: &Event| {
            if let Event::PageLifecycleEvent(lifecycle) = event {
                if lifecycle.params.frame_id != main_frame {
                    return;
                }
                let mut seen = seen.lock().unwrap_or_else(PoisonError::into_inner);
                if lifecycle.params.name == "init" {
                    seen.clear();
                }
                seen.insert(lifecycle.params.name.clone());
            }
        }))?;

        Ok(reached)
    }
}

/// Chrome lifecycle event that satisfies `wait_until`.
fn lifecycle_event(wait_until: WaitUntil) -> &'static str {
    match wait_until {
        WaitUntil::Load => "load",
        WaitUntil::DomContentLoaded => "DOMContentLoaded",
        WaitUntil::NetworkIdle0 => "networkIdle",
        WaitUntil::NetworkIdle2 => "networkAlmostIdle",
    }
}

/// `Page.printToPDF` parameters. Missing templates are sent as empty so
/// Chrome leaves the header and footer bands blank.
fn pdf_options(config: &RenderConfig) -> Result<PrintToPdfOptions> {
    let (paper_width, paper_height) = paper_size(config)?;
    let margin = config.margin.clone().unwrap_or_default();
    let margin_side = |side: &Option<String>| side.as_deref().map_or(Ok(0.0), to_inches);

    Ok(PrintToPdfOptions {
        landscape: Some(config.landscape),
        display_header_footer: Some(config.display_header_footer),
        print_background: Some(config.print_background),
        scale: Some(scale(config)?),
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(margin_side(&margin.top)?),
        margin_bottom: Some(margin_side(&margin.bottom)?),
        margin_left: Some(margin_side(&margin.left)?),
        margin_right: Some(margin_side(&margin.right)?),
        page_ranges: Some(config.page_ranges.clone()),
        header_template: Some(config.header_template.clone().unwrap_or_default()),
        footer_template: Some(config.footer_template.clone().unwrap_or_default()),
        prefer_css_page_size: Some(false),
        ..Default::default()
    })
}

/// Paper size in inches. An explicit width or height replaces the
/// corresponding side of the named format.
fn paper_size(config: &RenderConfig) -> Result<(f64, f64)> {
    let format = config.format.to_ascii_lowercase();
    let (_, format_width, format_height) = PAPER_FORMATS
        .iter()
        .find(|(name, _, _)| *name == format)
        .ok_or_else(|| Error::Render(format!("Unknown paper format: {}", config.format)))?;

    let width = match &config.width {
        Some(width) => to_inches(width)?,
        None => *format_width,
    };
    let height = match &config.height {
        Some(height) => to_inches(height)?,
        None => *format_height,
    };
    Ok((width, height))
}

/// Converts a length like `10mm`, `1.5in`, `2cm`, `300px` or `300` to inches.
fn to_inches(value: &str) -> Result<f64> {
    let lower = value.trim().to_ascii_lowercase();
    let (number, px_per_unit) = UNITS
        .iter()
        .find_map(|(unit, px)| lower.strip_suffix(unit).map(|number| (number, *px)))
        .unwrap_or((lower.as_str(), 1.0));

    let number = number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite() && *number >= 0.0)
        .ok_or_else(|| Error::Render(format!("Invalid length `{}`", value)))?;
    Ok(number * px_per_unit / PX_PER_INCH)
}

fn scale(config: &RenderConfig) -> Result<f64> {
    if config.scale.is_finite() && config.scale > 0.0 {
        Ok(config.scale)
    } else {
        Err(Error::Render(format!("Invalid scale {}", config.scale)))
    }
}
