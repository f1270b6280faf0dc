use crate::config::{LaunchConfig, RenderConfig, WaitUntil};
use crate::error::{Error, Result};
use crate::source::RenderSource;
use log::{debug, info, warn};
use std::thread;

/// Media types the browser can be told to emulate.
const MEDIA_TYPES: [&str; 2] = ["print", "screen"];

/// A headless browser holding a single page.
pub trait Engine: Sized {
    fn launch(config: &LaunchConfig) -> Result<Self>;

    /// Load `url` and block until `wait_until` holds for the main frame.
    fn navigate(&mut self, url: &str, wait_until: WaitUntil) -> Result<()>;

    fn emulate_media_type(&mut self, media_type: &str) -> Result<()>;

    fn print_to_pdf(&mut self, config: &RenderConfig) -> Result<Vec<u8>>;

    /// Release the page and the browser process.
    fn close(self) -> Result<()>;
}

/// Render `source` to PDF bytes.
///
/// Once launched, the engine is closed exactly once before this returns,
/// whether rendering succeeded or not.
pub fn run<E: Engine>(
    source: &RenderSource,
    config: &RenderConfig,
    launch: &LaunchConfig,
) -> Result<Vec<u8>> {
    let mut engine = E::launch(launch)?;
    debug!("Browser launched");

    let rendered = render(&mut engine, source, config);

    if let Err(err) = engine.close() {
        warn!("{err}");
    } else {
        debug!("Browser closed");
    }

    rendered
}

fn render<E: Engine>(
    engine: &mut E,
    source: &RenderSource,
    config: &RenderConfig,
) -> Result<Vec<u8>> {
    let url = source.url()?;
    engine.navigate(&url, config.wait_until)?;
    debug!("Navigated to {url}");

    let media_type = config.emulate_media_type.as_str();
    if !media_type.is_empty() {
        if !MEDIA_TYPES.contains(&media_type) {
            return Err(Error::Emulation(format!("Unsupported media type `{media_type}`")));
        }
        engine.emulate_media_type(media_type)?;
        debug!("Emulating {media_type} media");
    }

    if config.delay_ms > 0 {
        debug!("Waiting {} ms", config.delay_ms);
        thread::sleep(config.delay());
    }

    if config.debug {
        info!("PDF options: {config}");
    }

    let pdf = engine.print_to_pdf(config)?;
    debug!("Rendered {} bytes", pdf.len());
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::parse;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    thread_local! {
        static CALLS: RefCell<Vec<String>> = RefCell::new(Vec::new());
        static FAIL_AT: RefCell<Option<&'static str>> = RefCell::new(None);
    }

    /// Records every call and fails at the step named in `FAIL_AT`.
    struct ScriptedEngine;

    fn step(name: &'static str, make_err: impl FnOnce() -> Error) -> Result<()> {
        CALLS.with(|calls| calls.borrow_mut().push(name.to_string()));
        match FAIL_AT.with(|fail_at| *fail_at.borrow()) {
            Some(failing) if failing == name => Err(make_err()),
            _ => Ok(()),
        }
    }

    impl Engine for ScriptedEngine {
        fn launch(_config: &LaunchConfig) -> Result<Self> {
            step("launch", || Error::Launch("no browser".into()))?;
            Ok(ScriptedEngine)
        }

        fn navigate(&mut self, url: &str, _wait_until: WaitUntil) -> Result<()> {
            step("navigate", || Error::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            })
        }

        fn emulate_media_type(&mut self, media_type: &str) -> Result<()> {
            step("emulate", || Error::Emulation(media_type.to_string()))
        }

        fn print_to_pdf(&mut self, _config: &RenderConfig) -> Result<Vec<u8>> {
            step("print", || Error::Render("Page range syntax error".into()))?;
            Ok(b"%PDF-1.4".to_vec())
        }

        fn close(self) -> Result<()> {
            step("close", || Error::Close("already gone".into()))
        }
    }

    fn run_scripted(
        args: &[&str],
        fail_at: Option<&'static str>,
    ) -> (Result<Vec<u8>>, Vec<String>) {
        CALLS.with(|calls| calls.borrow_mut().clear());
        FAIL_AT.with(|f| *f.borrow_mut() = fail_at);

        let opts = parse(args);
        let config = RenderConfig::build(&opts).unwrap();
        let launch = LaunchConfig::build(&opts);
        let source = RenderSource::LocalFile(PathBuf::from("/tmp/page.html"));

        let result = run::<ScriptedEngine>(&source, &config, &launch);
        let calls = CALLS.with(|calls| calls.borrow().clone());
        (result, calls)
    }

    #[test]
    fn test_success() {
        let (result, calls) = run_scripted(&["page.html"], None);

        assert_eq!(result.unwrap(), b"%PDF-1.4");
        assert_eq!(calls, ["launch", "navigate", "emulate", "print", "close"]);
    }

    #[test]
    fn test_navigation_failure_closes_engine() {
        let (result, calls) = run_scripted(&["https://unreachable.invalid"], Some("navigate"));

        assert!(matches!(result, Err(Error::Navigation { .. })));
        assert_eq!(calls, ["launch", "navigate", "close"]);
    }

    #[test]
    fn test_emulation_failure_closes_engine() {
        let (result, calls) = run_scripted(&["page.html"], Some("emulate"));

        assert!(matches!(result, Err(Error::Emulation(_))));
        assert_eq!(calls, ["launch", "navigate", "emulate", "close"]);
    }

    #[test]
    fn test_render_failure_closes_engine() {
        let (result, calls) = run_scripted(&["--pageRanges", "9-1", "page.html"], Some("print"));

        assert!(matches!(result, Err(Error::Render(_))));
        assert_eq!(calls, ["launch", "navigate", "emulate", "print", "close"]);
    }

    #[test]
    fn test_launch_failure_has_nothing_to_close() {
        let (result, calls) = run_scripted(&["page.html"], Some("launch"));

        assert!(matches!(result, Err(Error::Launch(_))));
        assert_eq!(calls, ["launch"]);
    }

    #[test]
    fn test_close_failure_keeps_pdf() {
        let (result, calls) = run_scripted(&["page.html"], Some("close"));

        assert_eq!(result.unwrap(), b"%PDF-1.4");
        assert_eq!(calls.last().map(String::as_str), Some("close"));
    }

    #[test]
    fn test_unsupported_media_type() {
        let (result, calls) = run_scripted(&["--emulateMediaType", "tv", "page.html"], None);

        assert!(matches!(result, Err(Error::Emulation(_))));
        assert_eq!(calls, ["launch", "navigate", "close"]);
    }

    #[test]
    fn test_empty_media_type_skips_emulation() {
        let (result, calls) = run_scripted(&["--emulateMediaType", "", "page.html"], None);

        assert!(result.is_ok());
        assert_eq!(calls, ["launch", "navigate", "print", "close"]);
    }

    #[test]
    fn test_delay() {
        let start = Instant::now();
        let (result, _) = run_scripted(&["--delay", "50", "page.html"], None);

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
