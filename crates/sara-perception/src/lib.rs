//! `sara-perception` – what is on the screen right now.
//!
//! The rest of the system treats perception as a single opaque call,
//! [`ScreenReader::screen_text`], awaited on the request path with a bounded
//! budget per external tool.
//!
//! # Modules
//!
//! - [`screen`] – [`ScreenReader`][screen::ScreenReader] plus the
//!   [`OcrScreenReader`][screen::OcrScreenReader] backend (screenshot command +
//!   Tesseract) and the [`StaticScreen`][screen::StaticScreen] test double.

pub mod screen;

pub use screen::{OcrConfig, OcrScreenReader, ScreenReader, StaticScreen};
