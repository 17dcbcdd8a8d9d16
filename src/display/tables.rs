//! Table formatting for index statistics and search hits.

use comfy_table::{
    Attribute, Cell, CellAlignment, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::engine::{BuildStats, IndexStats};
use crate::query::SearchResults;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Two-column metric table.
fn metric_table(rows: Vec<(&str, String)>) -> String {
    rows.into_iter()
        .fold(
            TableBuilder::new().set_headers(vec!["Metric", "Value"]),
            |table, (name, value)| table.add_row(vec![name.to_string(), value]),
        )
        .build()
}

pub fn create_stats_table(stats: &IndexStats) -> String {
    metric_table(vec![
        ("Documents", stats.doc_count.to_string()),
        ("Terms", stats.term_count.to_string()),
        ("Clusters", stats.cluster_count.to_string()),
        ("Postings", stats.posting_count.to_string()),
        ("Pending terms", stats.pending_terms.to_string()),
        ("Posting memory", format_bytes(stats.posting_bytes)),
        ("Vector cache", format_bytes(stats.cache_bytes)),
    ])
}

pub fn create_build_table(stats: &BuildStats) -> String {
    metric_table(vec![
        ("Terms built", stats.terms.to_string()),
        ("Clusters", stats.clusters.to_string()),
        ("Postings kept", stats.postings.to_string()),
        ("Posting cap", stats.n_postings.to_string()),
        (
            "Mode",
            if stats.exhaustive { "exhaustive" } else { "clustered" }.to_string(),
        ),
        ("Elapsed", format!("{:.2?}", stats.elapsed)),
    ])
}

/// Ranked hits, one row each.
pub fn create_results_table(results: &SearchResults) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Doc").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
    ]);
    for (rank, hit) in results.hits.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1).set_alignment(CellAlignment::Right),
            Cell::new(hit.doc_id),
            Cell::new(format!("{:.4}", hit.score)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
