//! Text rendering of events, stats and the level view.

use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use prettytable::{Table, format, row};

use crate::event::Event;
use crate::tree::{TreeStats, bracketed};

/// `HH:MM:SS` (UTC) of an event timestamp
pub fn clock(timestamp: SystemTime) -> String {
    let secs = timestamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600 % 24,
        secs / 60 % 60,
        secs % 60
    )
}

pub fn events_table<'a>(events: impl IntoIterator<Item = &'a Event>) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row!["time", "kind", "message"]);
    for event in events {
        table.add_row(row![clock(event.timestamp), event.kind, event.message]);
    }
    table
}

pub fn stats_table(stats: &TreeStats) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(row!["variant", stats.variant]);
    table.add_row(row!["fanout", stats.fanout]);
    table.add_row(row!["height", stats.height]);
    table.add_row(row!["nodes", stats.node_count]);
    table.add_row(row!["keys stored", stats.element_count]);
    table.add_row(row!["keys per node", format!("{}..={}", stats.min_keys, stats.max_keys)]);
    if let Some(values) = stats.leaf_values {
        table.add_row(row!["leaf values", values]);
    }
    table
}

/// One line per level, nodes side by side
pub fn levels<K: Display>(levels: &[Vec<Vec<K>>]) -> String {
    levels
        .iter()
        .enumerate()
        .map(|(depth, nodes)| {
            let nodes: Vec<String> = nodes.iter().map(|keys| bracketed(keys)).collect();
            format!("L{depth}: {}", nodes.join("  "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
