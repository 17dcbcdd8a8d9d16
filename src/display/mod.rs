//! Terminal output for the CLI: progress bars and tables.

pub mod progress;
pub mod tables;

pub use progress::{create_progress_bar, create_spinner, optional_progress_bar, optional_spinner};
pub use tables::{TableBuilder, create_build_table, create_results_table, create_stats_table};
