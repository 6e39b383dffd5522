//! Utility modules: developer tracing and logger setup.
pub mod devlog;
pub mod logger;
