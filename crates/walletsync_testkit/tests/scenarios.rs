//! End-to-end sync scenarios over every entity.

use std::sync::Arc;
use walletsync_engine::{
    JsonFileCheckpointStore, RemoteBackend, RemoteOp, SyncConfig, SyncEngine, SyncError,
};
use walletsync_entities::{
    currency, tag, wallet, wallet_type, Currency, Tag, TagSync, Wallet,
    WalletSync, WalletType,
};
use walletsync_protocol::{ConflictPolicy, LocalId, RemoteId, RemoteRow};
use walletsync_testkit::prelude::*;

async fn remote_tag(world: &TestWorld, name: &str) -> RemoteId {
    world
        .backend
        .insert(tag::TABLE, RemoteRow::new().with("name", name).with("color", "#112233"))
        .await
        .unwrap()
        .id()
        .unwrap()
}

async fn local_currency(world: &TestWorld) -> LocalId {
    world
        .collection::<Currency>(currency::TABLE)
        .create(
            Currency {
                code: "TZS".into(),
                name: "Tanzanian Shilling".into(),
                symbol: "TSh".into(),
                decimals: 2,
            },
            world.now(),
        )
        .await
        .unwrap()
        .id
}

async fn local_wallet_type(world: &TestWorld) -> LocalId {
    world
        .collection::<WalletType>(wallet_type::TABLE)
        .create(
            WalletType {
                name: "Mobile money".into(),
                icon: None,
            },
            world.now(),
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn new_local_tag_is_pushed_and_marked_clean() {
    let world = TestWorld::new();
    let tags = world.collection::<Tag>(tag::TABLE);
    let created = tags.create(Tag::new("Food", "#ff0000"), world.now()).await.unwrap();
    world.backend.set_next_id(123);

    let report = world.orchestrator().unwrap().sync_all(&world.user_id).await;
    assert!(report.is_success());
    assert_eq!(report.get(tag::TABLE).unwrap().outcome.as_ref().unwrap().changes_pushed, 1);

    let stored = tags.get(&created.id).await.unwrap().unwrap();
    assert_eq!(stored.remote_id, Some(RemoteId::new("srv-123")));
    assert!(!stored.dirty);
    let row = world.backend.row(tag::TABLE, &RemoteId::new("srv-123")).unwrap();
    assert_eq!(row.str("name").unwrap(), "Food");
    assert_eq!(row.str("user_id").unwrap(), world.user_id);
}

#[tokio::test]
async fn remote_trash_row_removes_local_tag() {
    let world = TestWorld::new();
    let engine = world.engine(TagSync).unwrap();
    let remote_id = remote_tag(&world, "Travel").await;
    engine.sync(&world.user_id).await.unwrap();
    assert_eq!(engine.collection().all().await.unwrap().len(), 1);

    // Deleted from another device signed in as the same user.
    world.backend.delete(tag::TABLE, &remote_id).await.unwrap();

    let counts = engine.sync(&world.user_id).await.unwrap();
    assert_eq!(counts.deletions_pulled, 1);
    assert!(engine.collection().all().await.unwrap().is_empty());
    assert!(engine.ledger().pending(tag::TABLE).await.unwrap().is_empty());
}

#[tokio::test]
async fn dirty_local_tag_keeps_its_fields_and_is_pushed() {
    let world = TestWorld::new();
    let engine = world.engine(TagSync).unwrap();
    let remote_id = remote_tag(&world, "Original").await;
    engine.sync(&world.user_id).await.unwrap();
    let local = engine.collection().find_by_remote_id(&remote_id).await.unwrap().unwrap();

    world
        .backend
        .update(tag::TABLE, &remote_id, RemoteRow::new().with("name", "Server edit"))
        .await
        .unwrap();
    engine
        .collection()
        .edit(&local.id, world.now(), |t| t.name = "Local edit".into())
        .await
        .unwrap();

    let counts = engine.sync(&world.user_id).await.unwrap();
    assert_eq!(counts.conflicts, 1);
    assert_eq!(counts.changes_pushed, 1);

    let stored = engine.collection().get(&local.id).await.unwrap().unwrap();
    assert_eq!(stored.data.name, "Local edit");
    assert!(!stored.dirty);
    let row = world.backend.row(tag::TABLE, &remote_id).unwrap();
    assert_eq!(row.str("name").unwrap(), "Local edit");
}

#[tokio::test]
async fn referents_sync_before_referencing_records() {
    let world = TestWorld::new();
    let currency_id = local_currency(&world).await;
    let wallet_type_id = local_wallet_type(&world).await;
    let wallets = world.collection::<Wallet>(wallet::TABLE);
    let created = wallets
        .create(
            Wallet {
                name: "M-Pesa".into(),
                balance: 50_000,
                archived: false,
                currency_id: currency_id.clone(),
                wallet_type_id,
            },
            world.now(),
        )
        .await
        .unwrap();

    // Alone, the wallet engine cannot push: its currency has no remote id.
    let alone = world.engine(WalletSync).unwrap();
    let counts = alone.sync(&world.user_id).await.unwrap();
    assert_eq!(counts.changes_pushed, 0);
    assert_eq!(counts.skipped, 1);
    assert!(wallets.get(&created.id).await.unwrap().unwrap().dirty);

    let report = world.orchestrator().unwrap().sync_all(&world.user_id).await;
    assert!(report.is_success());

    let currency = world
        .collection::<Currency>(currency::TABLE)
        .get(&currency_id)
        .await
        .unwrap()
        .unwrap();
    let wallet = wallets.get(&created.id).await.unwrap().unwrap();
    assert!(!wallet.dirty);
    let row = world.backend.row(wallet::TABLE, wallet.remote_id.as_ref().unwrap()).unwrap();
    assert_eq!(row.id_in("currency_id"), currency.remote_id);
}

#[tokio::test]
async fn remote_reference_to_unknown_record_is_skipped_until_resolved() {
    let world = TestWorld::new();
    let currency = world
        .backend
        .insert(
            currency::TABLE,
            RemoteRow::new()
                .with("code", "KES")
                .with("name", "Kenyan Shilling")
                .with("decimals", 2),
        )
        .await
        .unwrap()
        .id()
        .unwrap();
    let wallet_type = world
        .backend
        .insert(wallet_type::TABLE, RemoteRow::new().with("name", "Cash"))
        .await
        .unwrap()
        .id()
        .unwrap();
    world
        .backend
        .insert(
            wallet::TABLE,
            RemoteRow::new()
                .with("name", "Pocket")
                .with("balance", 700)
                .with("currency_id", currency.as_str())
                .with("wallet_type_id", wallet_type.as_str()),
        )
        .await
        .unwrap();

    let wallets = world.engine(WalletSync).unwrap();
    let counts = wallets.sync(&world.user_id).await.unwrap();
    assert_eq!(counts.changes_pulled, 0);
    assert_eq!(counts.skipped, 1);

    // A fresh device syncing in order materializes everything.
    let fresh = TestWorld::for_user("user-2");
    for table in [currency::TABLE, wallet_type::TABLE, wallet::TABLE] {
        for row in world.backend.rows(table) {
            fresh.backend.seed_row(table, row);
        }
    }
    let report = fresh.orchestrator().unwrap().sync_all(&fresh.user_id).await;
    assert!(report.is_success());
    assert_eq!(fresh.store.records(wallet::TABLE).len(), 1);
}

#[tokio::test]
async fn failing_entity_does_not_stop_later_entities() {
    let world = TestWorld::new();
    world
        .collection::<Tag>(tag::TABLE)
        .create(Tag::new("Bills", "#abcdef"), world.now())
        .await
        .unwrap();
    world.backend.fail(RemoteOp::Select, currency::TABLE);

    let report = world.orchestrator().unwrap().sync_all(&world.user_id).await;
    assert!(!report.is_success());
    let failed: Vec<&str> = report.failed().map(|e| e.table).collect();
    assert_eq!(failed, [currency::TABLE]);
    assert!(matches!(
        report.get(currency::TABLE).unwrap().outcome,
        Err(SyncError::Remote(_))
    ));
    assert_eq!(report.totals().changes_pushed, 1);
}

#[tokio::test]
async fn offline_sync_changes_nothing() {
    let world = TestWorld::new();
    world
        .collection::<Tag>(tag::TABLE)
        .create(Tag::new("Offline", "#000000"), world.now())
        .await
        .unwrap();
    world.set_online(false);

    let report = world.orchestrator().unwrap().sync_all(&world.user_id).await;
    assert!(report.is_success());
    assert!(report.totals().is_empty());
    assert!(world.checkpoints.snapshot().is_empty());
    assert_eq!(world.backend.calls().selects, 0);

    world.set_online(true);
    let report = world.orchestrator().unwrap().sync_all(&world.user_id).await;
    assert_eq!(report.totals().changes_pushed, 1);
    assert_eq!(world.checkpoints.snapshot().len(), 7);
}

#[tokio::test]
async fn merge_policy_combines_wallet_fields() {
    let world = TestWorld::new();
    let currency_id = local_currency(&world).await;
    let wallet_type_id = local_wallet_type(&world).await;
    let wallets = world.collection::<Wallet>(wallet::TABLE);
    let created = wallets
        .create(
            Wallet {
                name: "Savings".into(),
                balance: 1_000,
                archived: false,
                currency_id,
                wallet_type_id,
            },
            world.now(),
        )
        .await
        .unwrap();
    world.orchestrator().unwrap().sync_all(&world.user_id).await;
    let remote_id = wallets.get(&created.id).await.unwrap().unwrap().remote_id.unwrap();

    world
        .backend
        .update(wallet::TABLE, &remote_id, RemoteRow::new().with("balance", 2_500))
        .await
        .unwrap();
    wallets
        .edit(&created.id, world.now(), |w| w.name = "Emergency fund".into())
        .await
        .unwrap();

    let config = SyncConfig::new().with_conflict_policy(ConflictPolicy::Merge);
    let engine = SyncEngine::new(WalletSync, world.context().with_config(config)).unwrap();
    let counts = engine.sync(&world.user_id).await.unwrap();
    assert_eq!(counts.conflicts, 1);
    assert_eq!(counts.changes_pushed, 1);

    let merged = wallets.get(&created.id).await.unwrap().unwrap();
    assert_eq!(merged.data.name, "Emergency fund");
    assert_eq!(merged.data.balance, 2_500);
    let row = world.backend.row(wallet::TABLE, &remote_id).unwrap();
    assert_eq!(row.str("name").unwrap(), "Emergency fund");
    assert_eq!(row.i64("balance").unwrap(), 2_500);
}

#[tokio::test]
async fn checkpoints_survive_restart_in_json_file() {
    let world = TestWorld::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoints.json");
    remote_tag(&world, "Persisted").await;

    let ctx = world
        .context()
        .with_checkpoints(Arc::new(JsonFileCheckpointStore::new(&path)));
    let engine = SyncEngine::new(TagSync, ctx.clone()).unwrap();
    engine.sync(&world.user_id).await.unwrap();
    let checkpoint = engine.last_sync().await.unwrap();

    let restarted = SyncEngine::new(
        TagSync,
        ctx.with_checkpoints(Arc::new(JsonFileCheckpointStore::new(&path))),
    )
    .unwrap();
    assert_eq!(restarted.last_sync().await.unwrap(), checkpoint);
    let counts = restarted.sync(&world.user_id).await.unwrap();
    assert_eq!(counts.total_writes(), 0);
}

#[tokio::test]
async fn replayed_fixture_is_already_in_sync() {
    let world = TestWorld::new();
    remote_tag(&world, "Replay").await;
    world
        .collection::<Currency>(currency::TABLE)
        .create(
            Currency {
                code: "USD".into(),
                name: "US Dollar".into(),
                symbol: "$".into(),
                decimals: 2,
            },
            world.now(),
        )
        .await
        .unwrap();
    assert!(world.orchestrator().unwrap().sync_all(&world.user_id).await.is_success());

    let temp = TempFixture::write(&world.to_fixture()).unwrap();
    let fixture = Fixture::load(temp.path()).unwrap();
    let replay = TestWorld::from_fixture(fixture, None, chrono::Utc::now());
    let report = replay.orchestrator().unwrap().sync_all(&replay.user_id).await;
    assert!(report.is_success());
    assert_eq!(report.totals().total_writes(), 0);
}
