/// Audio recognition from uploads and voice messages
pub mod audio;
/// Inline keyboard presses
pub mod callbacks;
/// Command handlers and shared reply helpers
pub mod handlers;
/// Inline mode
pub mod inline;
/// Unauthorized access flood protection
pub mod unauthorized_cache;
/// Keyboards and callback data
pub mod views;

pub use unauthorized_cache::UnauthorizedCache;
