pub mod catalog;
pub mod config;
pub mod craft;
pub mod fabricator;
pub mod meme;
pub mod music;
pub mod picker;
pub mod segment;

/// Microseconds in one minute, for beats-to-micros timing math.
pub const MICROS_PER_MINUTE: i64 = 60_000_000;
