//! Prune policy against a live SQLite table

use super::test_utils::{connect, exec, manage_table, seed_manage_table, sqlite_url};
use safeguard::audit::AuditLog;
use safeguard::reconciler::{CycleReport, Reconciler};
use safeguard::store::{RowKey, Scalar};
use safeguard::table::{PruneReconciler, PruneReport, RowSnapshot};
use tempfile::TempDir;

#[tokio::test]
async fn test_only_sentinel_survives() {
    let dir = TempDir::new().unwrap();
    let url = sqlite_url(&dir, "faka.db");
    let tamperer = connect(&url).await;
    seed_manage_table(tamperer.as_ref(), &[7, 8, 42]).await;

    let log_path = dir.path().join("acg_manage_cleanup.log");
    let audit = AuditLog::open("prune", &log_path).unwrap();
    let mut prune = PruneReconciler::new(
        "prune",
        connect(&url).await,
        manage_table(),
        RowKey::Int(1),
        audit,
    );

    let report = prune.run_cycle().await.unwrap();

    assert_eq!(
        report,
        CycleReport::Prune(PruneReport {
            scanned: 4,
            logged: 3,
            removed: 3
        })
    );
    let remaining = RowSnapshot::capture(tamperer.as_ref(), &manage_table())
        .await
        .unwrap();
    assert_eq!(remaining.keys().cloned().collect::<Vec<_>>(), vec![RowKey::Int(1)]);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let deleted: Vec<_> = log.lines().filter(|l| l.contains("row_deleted")).collect();
    assert_eq!(deleted.len(), 3);
    assert!(deleted[0].contains(r#""email":"admin7@example.com""#));
    assert!(deleted[0].contains(r#""password":"0xdead07""#));
    assert!(deleted[0].contains(r#""login_time":null"#));
}

#[tokio::test]
async fn test_repeated_cycles_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let url = sqlite_url(&dir, "faka.db");
    let tamperer = connect(&url).await;
    seed_manage_table(tamperer.as_ref(), &[2]).await;
    let audit = AuditLog::in_memory("prune");
    let prune = PruneReconciler::new("prune", connect(&url).await, manage_table(), RowKey::Int(1), audit.clone());

    prune.prune_cycle().await.unwrap();
    let second = prune.prune_cycle().await.unwrap();

    assert_eq!(second.removed, 0);
    assert!(audit.lines().last().unwrap().contains("prune_heartbeat"));
}

#[tokio::test]
async fn test_rows_added_between_cycles_are_pruned() {
    let dir = TempDir::new().unwrap();
    let url = sqlite_url(&dir, "faka.db");
    let tamperer = connect(&url).await;
    seed_manage_table(tamperer.as_ref(), &[]).await;
    let prune = PruneReconciler::new(
        "prune",
        connect(&url).await,
        manage_table(),
        RowKey::Int(1),
        AuditLog::in_memory("prune"),
    );

    assert_eq!(prune.prune_cycle().await.unwrap().removed, 0);
    exec(
        tamperer.as_ref(),
        "INSERT INTO acg_manage (id, email) VALUES (?, ?)",
        vec![Scalar::Int(99), "intruder@example.com".into()],
    )
    .await;
    assert_eq!(prune.prune_cycle().await.unwrap().removed, 1);
}

#[tokio::test]
async fn test_missing_sentinel_removes_everything() {
    let dir = TempDir::new().unwrap();
    let url = sqlite_url(&dir, "faka.db");
    let tamperer = connect(&url).await;
    seed_manage_table(tamperer.as_ref(), &[2, 3]).await;
    exec(tamperer.as_ref(), "DELETE FROM acg_manage WHERE id = 1", vec![]).await;
    let prune = PruneReconciler::new(
        "prune",
        connect(&url).await,
        manage_table(),
        RowKey::Int(1),
        AuditLog::in_memory("prune"),
    );

    let report = prune.prune_cycle().await.unwrap();

    assert_eq!(report.removed, 2);
    assert!(tamperer.fetch_rows(&manage_table()).await.unwrap().is_empty());
}
