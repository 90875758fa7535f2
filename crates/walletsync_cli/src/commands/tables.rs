//! Tables command implementation.

use serde::Serialize;
use walletsync_entities::{dependencies, SYNC_ORDER};

/// One entity in sync order.
#[derive(Debug, Serialize)]
pub struct TableInfo {
    /// Position in the sync order, starting at 1.
    pub position: usize,
    /// Remote table name.
    pub table: &'static str,
    /// Tables that must sync first.
    pub depends_on: &'static [&'static str],
}

/// Collects the entity tables in sync order.
pub fn collect() -> Vec<TableInfo> {
    SYNC_ORDER
        .into_iter()
        .enumerate()
        .map(|(i, table)| TableInfo {
            position: i + 1,
            table,
            depends_on: dependencies(table).unwrap_or(&[]),
        })
        .collect()
}

/// Runs the tables command.
pub fn run(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let tables = collect();
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&tables)?),
        _ => {
            for info in &tables {
                if info.depends_on.is_empty() {
                    println!("{}. {}", info.position, info.table);
                } else {
                    println!("{}. {} (after {})", info.position, info.table, info.depends_on.join(", "));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_come_earlier() {
        let tables = collect();
        for info in &tables {
            for dep in info.depends_on {
                let dep_pos = tables.iter().find(|t| t.table == *dep).unwrap().position;
                assert!(dep_pos < info.position, "{} listed before {}", info.table, dep);
            }
        }
    }
}
