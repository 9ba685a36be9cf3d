//! CLI binary for slidegen.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GeneratorConfig` and prints results.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slidegen::config::{DEFAULT_BASE_URL, DEFAULT_MAX_CONCURRENT};
use slidegen::env_file::{load_env_file, ENV_FILE};
use slidegen::pipeline::articles::{expand_article_paths, ArticleCounts};
use slidegen::{
    generate, GenerationProgressCallback, GenerationSummary, GeneratorConfig, PageSelection,
    ProgressCallback,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per settled
/// request. Requests settle out of order, so lines carry their position.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
    retries: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_batch_start` reports the batch size.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading outline…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
            retries: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }

    fn elapsed(&self) -> String {
        dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Sending {total} image request(s)…"))
        ));
    }

    fn on_request_retry(&self, position: usize, attempt: u32, error: String) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Request {:>3}  attempt {} failed, retrying: {}",
            yellow("↻"),
            position + 1,
            attempt,
            dim(&truncate(&error, 80)),
        ));
    }

    fn on_request_complete(&self, position: usize, _completed: usize, total: usize, bytes: usize) {
        self.bar.println(format!(
            "  {} Request {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            position + 1,
            total,
            dim(&format!("{:>6} KiB", bytes / 1024)),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_request_error(&self, position: usize, _completed: usize, total: usize, error: String) {
        self.bar.println(format!(
            "  {} Request {:>3}/{:<3}  {}  {}",
            red("✗"),
            position + 1,
            total,
            red(&truncate(&error, 80)),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        let retries = self.retries.load(Ordering::SeqCst);
        let retry_note = if retries > 0 {
            dim(&format!("  ({retries} retries)"))
        } else {
            String::new()
        };

        if failed == 0 {
            eprintln!(
                "{} {} image(s) generated{}",
                green("✔"),
                bold(&success_count.to_string()),
                retry_note
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) generated  ({} failed){}",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
                retry_note
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Explore a look: 4 variants of the first slide, no style image
  slidegen --outline talk.md --copy 4

  # Whole deck in the style of a chosen image
  slidegen --outline talk.md --style output_20250101_120000/slide_p01_v02.png

  # Only some slides, two variants each, into a fixed directory
  slidegen --outline talk.md --style style.png --page "1,3-5" --copy 2 -o deck

  # Ground the slides in source articles (globs allowed)
  slidegen --outline talk.md --style style.png --article paper.pdf --article 'notes/*.md'

OUTPUT:
  <output>/slide_pXX_vYY.png   one file per successful variant (XX slide, YY variant)
  <output>/slide_combined.pdf  every saved image, 1920x1080 per page

  The default output directory is ./output_YYYYMMDD_HHMMSS.

OUTLINE FORMAT:
  Every line starting with ## starts a slide. A leading "Slide N:" is dropped
  from the title. A slide titled "Global Visual Requirements", "Visual Style" or
  "Design Standards" is not rendered; its text styles every other slide.

ENVIRONMENT VARIABLES (also read from ./.env):
  OPENROUTER_API_KEY         API key (required)
  OPENROUTER_MODEL           Image-capable model, e.g. google/gemini-3.1-flash-image-preview
  OPENROUTER_MAX_CONCURRENT  Max requests in flight (default 36)
  OPENROUTER_PROXY           HTTP(S) or SOCKS5 proxy URL
  OPENROUTER_BASE_URL        API root (default https://openrouter.ai/api/v1)
  PDFIUM_LIB_PATH            Path to libpdfium (file or directory)
  RUST_LOG                   Override log filter (e.g. slidegen=debug)

  .env holds either KEY=value lines or an INI [openrouter] section with
  api_key, model, proxy and max_concurrent. Set variables take precedence.
"#;

/// Generate slide images from a markdown outline.
#[derive(Parser, Debug)]
#[command(
    name = "slidegen",
    version,
    about = "Generate slide images from a markdown outline",
    long_about = "Generate slide images from a markdown outline using an image-capable \
chat-completion API (OpenRouter). Without --style only the first slide is generated; \
with --style every slide is generated in that image's style.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown outline file.
    #[arg(long)]
    outline: PathBuf,

    /// Style reference image. If omitted, only the first slide is generated.
    #[arg(long)]
    style: Option<PathBuf>,

    /// Number of image variants per slide.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    copy: u32,

    /// Output directory for images and PDF [default: ./output_YYYYMMDD_HHMMSS].
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Article file or glob (.pdf, .md, .markdown). Repeatable.
    #[arg(long = "article", value_name = "PATH_OR_GLOB")]
    articles: Vec<String>,

    /// OpenRouter API key.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Pages to generate: 1, 1,3,5, 1-5 or 1,3-5,7. Default: all.
    #[arg(long)]
    page: Option<String>,

    /// HTTP/HTTPS/SOCKS5 proxy URL.
    #[arg(long, env = "OPENROUTER_PROXY")]
    proxy: Option<String>,

    /// Image-capable model ID.
    #[arg(long, env = "OPENROUTER_MODEL")]
    model: Option<String>,

    /// Maximum requests in flight.
    #[arg(short, long, env = "OPENROUTER_MAX_CONCURRENT", default_value_t = DEFAULT_MAX_CONCURRENT)]
    concurrency: usize,

    /// API root; requests go to <base-url>/chat/completions.
    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-attempt request timeout in seconds.
    #[arg(long, env = "SLIDEGEN_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Attempts per request, including the first.
    #[arg(long, env = "SLIDEGEN_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SLIDEGEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIDEGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap's `env` attributes see its values.
    let env_file = load_env_file(Path::new(ENV_FILE))
        .with_context(|| format!("Could not read {ENV_FILE}"))?;
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();
    tracing::debug!("{ENV_FILE}: {env_file:?}");

    // ── Resolve inputs ───────────────────────────────────────────────────
    let output_dir = cli.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("./output_{}", Local::now().format("%Y%m%d_%H%M%S")))
    });

    let pages = match cli.page.as_deref() {
        Some(spec) => PageSelection::parse(spec).context("Invalid --page")?,
        None => PageSelection::All,
    };

    let article_paths = expand_article_paths(&cli.articles).context("Invalid --article")?;

    let outline = tokio::fs::read_to_string(&cli.outline)
        .await
        .with_context(|| format!("Failed to read outline from {:?}", cli.outline))?;

    if !cli.quiet && !cli.json {
        println!(
            "{}",
            summary_line(&cli, &pages, &article_paths, &output_dir)
        );
    }

    if cli.style.is_none() && !pages.contains(1) {
        if !cli.quiet {
            println!("No pages to generate (first slide mode, but page 1 not in filter)");
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, pages, article_paths, output_dir.clone(), progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let summary = generate(&outline, &config)
        .await
        .context("Generation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        println!("{}", done_line(&summary, &output_dir));
    }

    Ok(())
}

/// Map CLI args to `GeneratorConfig`.
fn build_config(
    cli: &Cli,
    pages: PageSelection,
    articles: Vec<PathBuf>,
    output_dir: PathBuf,
    progress: Option<ProgressCallback>,
) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .api_key(cli.api_key.clone().unwrap_or_default())
        .model(cli.model.clone().unwrap_or_default())
        .base_url(cli.base_url.clone())
        .proxy(cli.proxy.clone())
        .concurrency(cli.concurrency)
        .request_timeout_secs(cli.timeout)
        .max_attempts(cli.max_attempts)
        .copy(cli.copy as usize)
        .output_dir(output_dir)
        .pages(pages)
        .articles(articles);

    if let Some(ref style) = cli.style {
        builder = builder.style_image(style.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `Outline: … | copy: … | Pages: … | Articles: … | Style: … | Output: …`
fn summary_line(cli: &Cli, pages: &PageSelection, articles: &[PathBuf], output: &Path) -> String {
    let mut parts = vec![
        format!("Outline: {}", cli.outline.display()),
        format!("copy: {}", cli.copy),
    ];

    if let Some(list) = pages.pages() {
        let list: Vec<String> = list.iter().map(usize::to_string).collect();
        parts.push(format!("Pages: {}", list.join(",")));
    }
    if !articles.is_empty() {
        parts.push(format!("Articles: {}", ArticleCounts::of(articles)));
    }
    if let Some(ref style) = cli.style {
        parts.push(format!("Style: {}", style.display()));
    }

    let mut output_str = absolute(output).display().to_string();
    if cli.style.is_none() {
        output_str.push_str(" (first slide only)");
    }
    parts.push(format!("Output: {output_str}"));

    parts.join("  |  ")
}

fn done_line(summary: &GenerationSummary, output: &Path) -> String {
    let dir = absolute(output);
    match summary.pdf {
        Some(_) => format!(
            "Done. Saved {} image(s) and PDF to {}",
            summary.saved_count(),
            dir.display()
        ),
        None => format!(
            "Done. Saved {} image(s) to {} (no PDF)",
            summary.saved_count(),
            dir.display()
        ),
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        let argv = ["slidegen", "--outline", "talk.md", "--api-key", "k", "--model", "m"];
        Cli::try_parse_from(argv.iter().chain(args)).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn long_help_includes_every_section() {
        for section in ["EXAMPLES:", "OUTPUT:", "OUTLINE FORMAT:", "ENVIRONMENT VARIABLES"] {
            assert!(AFTER_HELP.contains(section), "missing {section}");
        }
        assert!(AFTER_HELP.contains("[openrouter]"));
    }

    #[test]
    fn concurrency_defaults_and_rejects_zero() {
        let cli = parse(&[]);
        assert_eq!(cli.concurrency, DEFAULT_MAX_CONCURRENT);
        let config =
            build_config(&cli, PageSelection::All, Vec::new(), PathBuf::from("out"), None).unwrap();
        assert_eq!(config.concurrency, DEFAULT_MAX_CONCURRENT);

        let cli = parse(&["-c", "0"]);
        let err =
            build_config(&cli, PageSelection::All, Vec::new(), PathBuf::from("out"), None)
                .unwrap_err();
        assert!(format!("{err:#}").contains("max_concurrent must be at least 1"));
    }
}
