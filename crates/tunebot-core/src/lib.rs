#![deny(missing_docs)]
//! `TuneBot` core library.
//!
//! Per-user admission control, music service access, localization and
//! message rendering shared by the transports.

/// Per-user sliding-window admission gate.
pub mod admission;
/// Configuration management.
pub mod config;
/// Telegram HTML rendering of catalog data.
pub mod format;
/// Localized texts and language preferences.
pub mod i18n;
/// Music recognition and catalog client.
pub mod music;
/// Quota-guarded access to the music service.
pub mod relay;
/// Utility functions.
pub mod utils;
