//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup | `init` |
//! | Element | Committed model (read-only) | `element list`, `element show` |
//! | Changeset | Changeset lifecycle | `changeset create`, `changeset list`, `changeset activate` |
//! | Staging | Edit a changeset | `stage add`, `stage update`, `stage delete`, `unstage` |
//! | Review | Inspect before committing | `preview`, `drift`, `validate` |
//! | Finish | Terminal transitions | `commit`, `discard` |
//!
//! Commands that act on a changeset take `--changeset <id>` and default to
//! the active changeset, which `changeset create` sets unless told not to.
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output, including the library's
//! `tracing` events:
//! ```bash
//! archstage --verbose commit
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod element;
mod changeset;
mod stage;
mod review;
mod commit;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
