//! Pipeline stages for outline-to-slides generation.
//!
//! Each submodule implements exactly one step. The dispatcher never touches
//! the wire format and the backend never sees more than one request, so
//! either side can be replaced in tests.
//!
//! ## Data Flow
//!
//! ```text
//! outline ──▶ (prompts) ──▶ batch ──▶ dispatch ──▶ backend ──▶ materialize ──▶ assemble
//! (slides)                (slot keys)  (cap, retry)  (HTTP)     (PNG files)     (PDF)
//! ```
//!
//! 1. [`outline`]: split the markdown outline into slides at `##`
//! 2. [`articles`]: resolve and read grounding articles (markdown, PDF text)
//! 3. [`dispatch`]: run a batch under one concurrency cap with per-attempt
//!    timeout and retry; the only stage that schedules work
//! 4. [`backend`]: one chat-completion call per attempt; message layout
//!    and response extraction
//! 5. [`encode`]: base64 data URIs in both directions
//! 6. [`materialize`]: report, save successes, trigger PDF assembly
//! 7. [`assemble`]: normalise images and write the combined PDF; runs in
//!    `spawn_blocking` because pdfium is not async-safe

pub mod articles;
pub mod assemble;
pub mod backend;
pub mod dispatch;
pub mod encode;
pub mod materialize;
pub mod outline;
