use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::{info, LevelFilter};

use crate::config::{LaunchConfig, RenderConfig, WaitUntil};
use crate::error::Error;
use crate::pdf::ChromeEngine;
use crate::source::RenderSource;

mod config;
mod error;
mod pdf;
mod session;
mod source;

/// Render a web page or a local HTML file to PDF with headless Chrome.
#[derive(Debug, clap::Parser)]
#[command(version)]
struct Options {
    /// URL or local path of the page to render
    source: Option<String>,

    /// The file path to save the PDF to (stdout if omitted)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Scale of the webpage rendering
    #[arg(short, long, default_value_t = 1.0)]
    scale: f64,

    /// Display header and footer
    #[arg(long = "displayHeaderFooter")]
    display_header_footer: bool,

    /// HTML template for the print header, inline or file://<path>
    #[arg(long = "headerTemplate", value_name = "TEMPLATE")]
    header_template: Option<String>,

    /// HTML template for the print footer, inline or file://<path>
    #[arg(long = "footerTemplate", value_name = "TEMPLATE")]
    footer_template: Option<String>,

    /// Print background graphics
    #[arg(long = "printBackground")]
    print_background: bool,

    /// Paper orientation
    #[arg(short, long)]
    landscape: bool,

    /// Paper ranges to print, e.g. '1-5, 8, 11-13'. Empty means all pages
    #[arg(long = "pageRanges", value_name = "RANGE")]
    page_ranges: Option<String>,

    /// Paper format, e.g. Letter or A4
    #[arg(short, long, default_value = "Letter")]
    format: String,

    /// Paper width, accepts values labeled with units
    #[arg(short, long)]
    width: Option<String>,

    /// Paper height, accepts values labeled with units
    #[arg(long = "heigh", value_name = "HEIGHT")]
    height: Option<String>,

    /// Top margin, accepts values labeled with units
    #[arg(long = "marginTop", value_name = "MARGIN")]
    margin_top: Option<String>,

    /// Right margin, accepts values labeled with units
    #[arg(long = "marginRight", value_name = "MARGIN")]
    margin_right: Option<String>,

    /// Bottom margin, accepts values labeled with units
    #[arg(long = "marginBottom", value_name = "MARGIN")]
    margin_bottom: Option<String>,

    /// Left margin, accepts values labeled with units
    #[arg(long = "marginLeft", value_name = "MARGIN")]
    margin_left: Option<String>,

    /// Output the PDF options and log browser I/O
    #[arg(short, long)]
    debug: bool,

    /// When navigation is considered finished
    #[arg(long = "waitUntil", value_enum, default_value_t = WaitUntil::NetworkIdle2)]
    wait_until: WaitUntil,

    /// Additional milliseconds to wait before rendering the PDF
    #[arg(long, value_name = "MILLISECONDS", default_value_t = 0)]
    delay: u64,

    /// Media type to emulate, print or screen
    #[arg(
        long = "emulateMediaType",
        value_name = "MEDIATYPE",
        default_value = "print"
    )]
    emulate_media_type: String,

    /// Navigation timeout in milliseconds
    #[arg(long, value_name = "MILLISECONDS", default_value_t = 30_000)]
    timeout: u64,

    /// Path to the Chrome or Chromium executable
    #[arg(long, env = "CHROME")]
    chrome: Option<PathBuf>,
}

fn main() {
    let opts = match Options::try_parse() {
        Ok(opts) => opts,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    init_logging(opts.debug);

    if let Err(err) = render(&opts) {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let mut builder = env_logger::Builder::from_env(env);
    raise_for_debug(&mut builder, debug);
    builder.init();
}

/// `--debug` shows our own debug output even when `RUST_LOG` is quieter.
fn raise_for_debug(builder: &mut env_logger::Builder, debug: bool) {
    if debug {
        builder.filter_module(module_path!(), LevelFilter::Debug);
    }
}

fn render(opts: &Options) -> anyhow::Result<()> {
    let config = RenderConfig::build(opts)?;
    let launch = LaunchConfig::build(opts);
    let source = RenderSource::resolve(opts.source.as_deref())?;

    let pdf = session::run::<ChromeEngine>(&source, &config, &launch)?;
    write_output(config.path.as_deref(), &pdf)?;

    info!("Rendered {} ({} bytes)", source, pdf.len());
    Ok(())
}

fn write_output(path: Option<&Path>, pdf: &[u8]) -> error::Result<()> {
    match path {
        Some(path) => fs::write(path, pdf).map_err(|source| Error::OutputWrite {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let stdout = io::stdout();
            let mut stdout = stdout.lock();
            stdout
                .write_all(pdf)
                .and_then(|_| stdout.flush())
                .map_err(|source| Error::OutputWrite {
                    path: PathBuf::from("<stdout>"),
                    source,
                })
        }
    }
}
