//! Output handling with stdout/stderr separation contract
//!
//! This module provides centralized output helpers that enforce the CLI's
//! stdout/stderr separation contract. All commands should use these helpers
//! instead of direct `println!` to prevent accidental mixing of logs with
//! machine-readable output.

use crate::redaction::{RedactingWriter, RedactionConfig, SecretRegistry};
use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};

/// Output helper that enforces stdout/stderr separation contract
///
/// This helper ensures that:
/// - JSON modes write only JSON to stdout
/// - Text modes write only user-facing results to stdout  
/// - All logs and diagnostics go to stderr via tracing
///
/// # Examples
///
/// ```
/// use crucible_core::io::Output;
/// use crucible_core::redaction::{RedactionConfig, SecretRegistry};
/// use serde_json::json;
///
/// let config = RedactionConfig::default();
/// let registry = SecretRegistry::new();
/// let mut output = Output::new(config, &registry);
///
/// // JSON output
/// let data = json!({"status": "success", "count": 42});
/// output.write_json(&data).unwrap();
///
/// // Text output  
/// output.write_line("Build completed successfully!").unwrap();
/// ```
pub struct Output {
    writer: RedactingWriter<Box<dyn Write>>,
}

impl Output {
    /// Create a new Output helper with redaction support
    ///
    /// # Examples
    ///
    /// ```
    /// use crucible_core::io::Output;
    /// use crucible_core::redaction::{RedactionConfig, SecretRegistry};
    ///
    /// let config = RedactionConfig::default();
    /// let registry = SecretRegistry::new();
    /// let output = Output::new(config, &registry);
    /// ```
    pub fn new(config: RedactionConfig, registry: &SecretRegistry) -> Self {
        let stdout = Box::new(io::stdout()) as Box<dyn Write>;
        let writer = RedactingWriter::new(stdout, config, registry);

        Self { writer }
    }

    /// Write a JSON-serializable value to stdout
    ///
    /// This method is intended for JSON output modes. It serializes the value
    /// as pretty-printed JSON and writes it to stdout with a trailing newline.
    /// Redaction is applied to the JSON string before output.
    ///
    /// # Examples
    ///
    /// ```
    /// use crucible_core::io::Output;
    /// use crucible_core::redaction::{RedactionConfig, SecretRegistry};
    /// use serde_json::json;
    ///
    /// let config = RedactionConfig::default();
    /// let registry = SecretRegistry::new();
    /// let mut output = Output::new(config, &registry);
    ///
    /// let result = json!({
    ///     "status": "success",
    ///     "features": ["docker", "node"],
    ///     "count": 2
    /// });
    ///
    /// output.write_json(&result).unwrap();
    /// ```
    pub fn write_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let json_output = serde_json::to_string(value)?;
        self.writer.write_line(&json_output)?;
        Ok(())
    }

    /// Write a text line to stdout
    ///
    /// This method is intended for human-readable text output modes. It writes
    /// the provided text to stdout with a trailing newline. Redaction is applied
    /// to the text before output.
    ///
    /// # Examples
    ///
    /// ```
    /// use crucible_core::io::Output;
    /// use crucible_core::redaction::{RedactionConfig, SecretRegistry};
    ///
    /// let config = RedactionConfig::default();
    /// let registry = SecretRegistry::new();
    /// let mut output = Output::new(config, &registry);
    ///
    /// output.write_line("Build completed successfully!").unwrap();
    /// output.write_line("Container ID: abc123def456").unwrap();
    /// ```
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        self.writer.write_line(text)?;
        Ok(())
    }

    /// Write multiple text lines to stdout
    ///
    /// Convenience method for writing multiple lines at once.
    /// Each line is written with a trailing newline.
    ///
    /// # Examples
    ///
    /// ```
    /// use crucible_core::io::Output;
    /// use crucible_core::redaction::{RedactionConfig, SecretRegistry};
    ///
    /// let config = RedactionConfig::default();
    /// let registry = SecretRegistry::new();
    /// let mut output = Output::new(config, &registry);
    ///
    /// let lines = vec![
    ///     "Configuration Loaded Successfully",
    ///     "========================",
    ///     "",
    ///     "Name: my-devcontainer",
    ///     "Image: mcr.microsoft.com/devcontainers/base:ubuntu",
    /// ];
    ///
    /// output.write_lines(&lines).unwrap();
    /// ```
    pub fn write_lines(&mut self, lines: &[&str]) -> Result<()> {
        for line in lines {
            self.write_line(line)?;
        }
        Ok(())
    }

    /// Flush any buffered output
    ///
    /// Ensures all buffered content is written to stdout immediately.
    /// This is automatically called when the Output is dropped, but can
    /// be called explicitly if needed.
    ///
    /// # Examples
    ///
    /// ```
    /// use crucible_core::io::Output;
    /// use crucible_core::redaction::{RedactionConfig, SecretRegistry};
    ///
    /// let config = RedactionConfig::default();
    /// let registry = SecretRegistry::new();
    /// let mut output = Output::new(config, &registry);
    ///
    /// output.write_line("Important message").unwrap();
    /// output.flush().unwrap(); // Ensure it's written immediately
    /// ```
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        // Ensure any buffered content is flushed on drop
        let _ = self.flush();
    }
}
