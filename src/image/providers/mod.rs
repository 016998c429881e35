//! Image service implementations.

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiService, GeminiServiceBuilder};
