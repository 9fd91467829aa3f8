//! Output formatting for CLI commands

use serde::Serialize;

use crate::storage;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<storage::OutputFormat> for OutputFormat {
    fn from(format: storage::OutputFormat) -> Self {
        match format {
            storage::OutputFormat::Text => OutputFormat::Text,
            storage::OutputFormat::Json => OutputFormat::Json,
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints a warning to stderr (text only; JSON output carries warnings in its data)
    pub fn warn(&self, message: &str) {
        if self.format == OutputFormat::Text {
            eprintln!("Warning: {}", message);
        }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        let json = match self.format {
            OutputFormat::Text => serde_json::to_string_pretty(data),
            OutputFormat::Json => serde_json::to_string(data),
        };
        if let Ok(json) = json {
            println!("{}", json);
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Returns true if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Prints a verbose debug message (only when --verbose is set)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", message);
        }
    }

    /// Prints a verbose debug message with context (only when --verbose is set)
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }
}
