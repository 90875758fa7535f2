//! Run command implementation.

use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::info;
use walletsync_engine::{SyncConfig, SyncCounts, SyncReport};
use walletsync_entities::default_orchestrator;
use walletsync_protocol::ConflictPolicy;
use walletsync_testkit::{Fixture, TestWorld};

/// Options of a fixture run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// User override.
    pub user: Option<String>,
    /// Restrict the run to one remote table.
    pub table: Option<String>,
    /// Conflict policy override.
    pub policy: Option<ConflictPolicy>,
    /// Run with the device offline.
    pub offline: bool,
    /// Number of consecutive rounds.
    pub rounds: u32,
}

/// Result of one entity in one round.
#[derive(Debug, Serialize)]
pub struct EntityResult {
    /// Remote table name.
    pub table: String,
    /// Counts, when the entity synced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<SyncCounts>,
    /// Error message, when it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time in milliseconds.
    pub duration_ms: u128,
}

/// Result of one round.
#[derive(Debug, Serialize)]
pub struct RoundResult {
    /// One-based round number.
    pub round: u32,
    /// Per-entity results, in sync order.
    pub entities: Vec<EntityResult>,
}

/// Result of the whole run.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    /// User the run synced as.
    pub user_id: String,
    /// Rounds, in order.
    pub rounds: Vec<RoundResult>,
    /// World state after the last round.
    #[serde(skip)]
    pub world: Fixture,
}

impl RunOutcome {
    /// Returns true if no entity failed in any round.
    pub fn is_success(&self) -> bool {
        self.rounds
            .iter()
            .flat_map(|r| &r.entities)
            .all(|e| e.error.is_none())
    }
}

fn entity_results(report: &SyncReport) -> Vec<EntityResult> {
    report
        .entities
        .iter()
        .map(|entity| EntityResult {
            table: entity.table.to_string(),
            counts: entity.outcome.as_ref().ok().copied(),
            error: entity.outcome.as_ref().err().map(ToString::to_string),
            duration_ms: entity.duration.as_millis(),
        })
        .collect()
}

/// Runs the run command.
pub async fn run(fixture_path: &Path, options: &RunOptions) -> Result<RunOutcome, Box<dyn std::error::Error>> {
    let fixture = Fixture::load(fixture_path)?;
    let world = TestWorld::from_fixture(fixture, options.user.as_deref(), Utc::now());
    world.set_online(!options.offline);

    let mut config = SyncConfig::new();
    if let Some(policy) = options.policy {
        config = config.with_conflict_policy(policy);
    }
    let orchestrator = default_orchestrator(&world.context().with_config(config))?;
    if let Some(table) = &options.table {
        if !orchestrator.contains(table) {
            return Err(format!("unknown table: {table}").into());
        }
    }

    let mut rounds = Vec::new();
    for round in 1..=options.rounds.max(1) {
        let entities = match &options.table {
            Some(table) => {
                let started = Instant::now();
                let outcome = orchestrator.sync_table(table, &world.user_id).await;
                vec![EntityResult {
                    table: table.clone(),
                    counts: outcome.as_ref().ok().copied(),
                    error: outcome.as_ref().err().map(ToString::to_string),
                    duration_ms: started.elapsed().as_millis(),
                }]
            }
            None => entity_results(&orchestrator.sync_all(&world.user_id).await),
        };
        info!(round, entities = entities.len(), "round finished");
        rounds.push(RoundResult { round, entities });
    }

    Ok(RunOutcome {
        user_id: world.user_id.clone(),
        rounds,
        world: world.to_fixture(),
    })
}

/// Prints a run outcome.
pub fn print(outcome: &RunOutcome, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        }
        _ => {
            print_text_output(outcome);
        }
    }
    Ok(())
}

fn print_text_output(outcome: &RunOutcome) {
    println!("Sync run for user {}", outcome.user_id);
    for round in &outcome.rounds {
        println!();
        println!("Round {}:", round.round);
        for entity in &round.entities {
            match (&entity.counts, &entity.error) {
                (Some(c), _) => println!(
                    "  {:<18} ok      pulled {}/{} pushed {}/{} conflicts {} skipped {} ({} ms)",
                    entity.table,
                    c.deletions_pulled,
                    c.changes_pulled,
                    c.deletions_pushed,
                    c.changes_pushed,
                    c.conflicts,
                    c.skipped,
                    entity.duration_ms,
                ),
                (None, Some(error)) => println!("  {:<18} FAILED  {}", entity.table, error),
                (None, None) => println!("  {:<18} ?", entity.table),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletsync_engine::RemoteBackend;
    use walletsync_protocol::RemoteRow;

    async fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let world = TestWorld::for_user("cli-user");
        world
            .backend
            .insert("tags", RemoteRow::new().with("name", "Groceries").with("color", "#00ff00"))
            .await
            .unwrap();
        let path = dir.join("world.json");
        world.to_fixture().save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn second_round_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path()).await;
        let options = RunOptions {
            rounds: 2,
            ..RunOptions::default()
        };

        let outcome = run(&path, &options).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.user_id, "cli-user");
        assert_eq!(outcome.rounds.len(), 2);

        let tags = |round: &RoundResult| {
            round
                .entities
                .iter()
                .find(|e| e.table == "tags")
                .and_then(|e| e.counts)
                .unwrap()
        };
        assert_eq!(tags(&outcome.rounds[0]).changes_pulled, 1);
        assert_eq!(tags(&outcome.rounds[1]).total_writes(), 0);
        assert_eq!(outcome.world.local.collections["tags"].len(), 1);
    }

    #[tokio::test]
    async fn single_table_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path()).await;
        let options = RunOptions {
            table: Some("tags".into()),
            rounds: 1,
            ..RunOptions::default()
        };

        let outcome = run(&path, &options).await.unwrap();
        assert_eq!(outcome.rounds[0].entities.len(), 1);
        assert!(outcome.world.local.collections.get("currencies").is_none());
    }

    #[tokio::test]
    async fn offline_run_pulls_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path()).await;
        let options = RunOptions {
            offline: true,
            rounds: 1,
            ..RunOptions::default()
        };

        let outcome = run(&path, &options).await.unwrap();
        assert!(outcome.is_success());
        assert!(outcome.world.local.collections.get("tags").is_none());
    }

    #[tokio::test]
    async fn unknown_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path()).await;
        let options = RunOptions {
            table: Some("budgets".into()),
            rounds: 1,
            ..RunOptions::default()
        };
        assert!(run(&path, &options).await.is_err());
    }
}
