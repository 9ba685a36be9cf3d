//! # slidegen
//!
//! Turn a markdown presentation outline into AI-generated slide images and a
//! combined PDF, using an image-capable chat-completion API (OpenRouter).
//!
//! ## Pipeline Overview
//!
//! ```text
//! outline.md
//!  │
//!  ├─ 1. Parse     `##` headings → slides; global style section split off
//!  ├─ 2. Prompt    per-slide (user, system) prompts with outline context
//!  ├─ 3. Batch     slides × copies, each keyed by (slide, variant)
//!  ├─ 4. Dispatch  concurrent requests under one cap, timeout + retry
//!  ├─ 5. Save      slide_pXX_vYY.png per success
//!  └─ 6. Assemble  slide_combined.pdf at 1920×1080 per page
//! ```
//!
//! A failed request never aborts the batch: it becomes a
//! [`GenerationOutcome::Failure`] and is reported next to the successes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slidegen::{generate, GeneratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GeneratorConfig::builder()
//!         .api_key(std::env::var("OPENROUTER_API_KEY")?)
//!         .model("google/gemini-3.1-flash-image-preview")
//!         .style_image("style.png")
//!         .copy(2)
//!         .output_dir("deck")
//!         .build()?;
//!     let outline = std::fs::read_to_string("outline.md")?;
//!     let summary = generate(&outline, &config).await?;
//!     eprintln!("saved {} image(s)", summary.saved_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slidegen` binary (clap + anyhow + tracing-subscriber + indicatif) and [`env_file`] `.env` loading |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! slidegen = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
#[cfg(feature = "cli")]
pub mod env_file;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{Batch, GenerationRequest, SlotKey};
pub use config::{GeneratorConfig, GeneratorConfigBuilder, PageSelection};
pub use error::{RequestError, SlidegenError};
pub use generate::{generate, generate_all_slides, generate_first_slide, generate_sync};
pub use output::{BatchReport, GenerationOutcome, GenerationSummary};
pub use pipeline::assemble::{DeckAssembler, PdfiumAssembler};
pub use pipeline::backend::{ImageBackend, OpenRouterBackend};
pub use pipeline::dispatch::{Dispatcher, RetryPolicy};
pub use pipeline::outline::{parse_outline, Slide};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
