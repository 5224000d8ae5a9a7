//! Full command runs through `RunContext`

use super::test_utils::{connect, exec, pay_table, seed_manage_table, seed_pay_table, sqlite_url, write_tree, read_tree};
use safeguard::cli::{Commands, RunContext};
use safeguard::config::{MirrorPair, SafeguardConfig};
use safeguard::table::RowSnapshot;
use std::time::Duration;
use tempfile::TempDir;

fn config_for(dir: &TempDir) -> SafeguardConfig {
    let mut config = SafeguardConfig::default();
    config.store.url = Some(sqlite_url(dir, "faka.db"));
    config.prune.audit_log = dir.path().join("logs/acg_manage_cleanup.log");
    config.restore.audit_log = dir.path().join("logs/acg_pay_protection.log");
    config.mirror.audit_log = dir.path().join("logs/mirror.log");
    config.mirror.pairs = vec![MirrorPair {
        name: "pay".into(),
        source: dir.path().join("backup/pay"),
        target: dir.path().join("www/pay"),
    }];
    config
}

#[tokio::test]
async fn test_once_reconciles_everything() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir);
    let db = connect(&sqlite_url(&dir, "faka.db")).await;
    seed_manage_table(db.as_ref(), &[2, 3]).await;
    seed_pay_table(db.as_ref()).await;
    write_tree(&dir.path().join("backup/pay"), &[("Alipay/Pay.php", "<?php ok();")]);

    let output = RunContext::from_config(dir.path().join("config.toml"), config)
        .execute(&Commands::Once { format: "json".into() }, std::future::pending())
        .await
        .unwrap();

    assert_eq!(output.exit_code, 0, "{}", output.text);
    let value: serde_json::Value = serde_json::from_str(&output.text).unwrap();
    let names: Vec<_> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["reconciler"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["mirror:pay", "prune", "restore"]);
    assert_eq!(
        read_tree(&dir.path().join("www/pay")),
        read_tree(&dir.path().join("backup/pay"))
    );
    let admin_log = std::fs::read_to_string(dir.path().join("logs/acg_manage_cleanup.log")).unwrap();
    assert_eq!(admin_log.lines().filter(|l| l.contains("row_deleted")).count(), 2);
}

#[tokio::test]
async fn test_run_until_shutdown() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.prune.enabled = false;
    config.mirror.interval_secs = 1;
    config.restore.interval_secs = 1;
    let db = connect(&sqlite_url(&dir, "faka.db")).await;
    seed_pay_table(db.as_ref()).await;
    write_tree(&dir.path().join("backup/pay"), &[("notify.php", "<?php")]);

    let context = RunContext::from_config(dir.path().join("config.toml"), config);
    let tamper = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        exec(db.as_ref(), "UPDATE acg_pay SET enabled = 0", vec![]).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
    };

    let output = context.execute(&Commands::Run, tamper).await.unwrap();

    assert_eq!(output.exit_code, 0);
    assert!(output.text.contains("mirror:pay"));
    assert!(output.text.contains("restore"));
    let live = RowSnapshot::capture(db.as_ref(), &pay_table()).await.unwrap();
    assert!(live
        .iter()
        .all(|(_, row)| row["enabled"] == safeguard::store::Scalar::Int(1)));
    let pay_log = std::fs::read_to_string(dir.path().join("logs/acg_pay_protection.log")).unwrap();
    assert!(pay_log.contains("restore_committed"));
}

#[tokio::test]
async fn test_unreachable_store_is_init_failure() {
    let dir = TempDir::new().unwrap();
    let mut config = config_for(&dir);
    config.store.url = Some(format!(
        "sqlite://{}?mode=ro",
        dir.path().join("missing/none.db").display()
    ));

    let result = RunContext::from_config("config.toml", config)
        .execute(&Commands::Once { format: "text".into() }, std::future::pending())
        .await;

    assert!(result.is_err());
}
