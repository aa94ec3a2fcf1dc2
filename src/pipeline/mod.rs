//! Pipeline stages for the page-to-chapter conversion.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap
//! implementations (e.g. a stub rasterizer in tests) without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! PDF ──▶ raster ──▶ transcribe ──▶ accumulate ──▶ split
//!        (pdfium)   (vision model)  (ordered      (linter model,
//!                                    append sink)  chapter files)
//! ```
//!
//! 1. [`raster`]     — rasterise every page to a temp JPEG; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 2. [`transcribe`] — render the parser prompt, call the vision model,
//!    strip wrapper fences from the response
//! 3. [`accumulate`] — append each page's markdown, strictly in page order,
//!    to the per-document transcript file
//! 4. [`split`]      — call the linter model on the full transcript, validate
//!    its chapter records, and materialise each chapter file
//!
//! The [`crate::batch`] orchestrator sequences these across a batch and owns
//! the failure/continue policy.

pub mod accumulate;
pub mod raster;
pub mod split;
pub mod transcribe;
