//! Property-based tests for mirror and restore guarantees

use super::test_utils::{connect, exec, pay_table, read_tree, seed_pay_table, sqlite_url, write_tree};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use safeguard::audit::AuditLog;
use safeguard::mirror::DirectoryMirror;
use safeguard::store::Scalar;
use safeguard::table::{RestoreReconciler, RowSnapshot};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn tree_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    let path = prop::sample::select(vec![
        "a.txt",
        "b.txt",
        "d/a.txt",
        "d/e/f.php",
        "x/y/z.json",
        "a.txt.bak",
    ]);
    prop::collection::btree_map(path.prop_map(String::from), "[a-c]{0,3}", 0..6)
}

fn materialize(root: &std::path::Path, tree: &BTreeMap<String, String>) {
    std::fs::create_dir_all(root).unwrap();
    let files: Vec<(&str, &str)> = tree.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    write_tree(root, &files);
}

/// After one sync the target equals the source; a second sync copies and
/// deletes nothing.
#[test]
fn test_mirror_converges_and_is_idempotent() {
    let mut runner = TestRunner::new(Config {
        cases: 48,
        ..Config::default()
    });

    runner
        .run(&(tree_strategy(), tree_strategy()), |(source_tree, target_tree)| {
            let dir = TempDir::new().unwrap();
            let source = dir.path().join("source");
            let target = dir.path().join("target");
            materialize(&source, &source_tree);
            materialize(&target, &target_tree);
            let mirror = DirectoryMirror::new("p", &source, &target, AuditLog::disabled("p"));

            mirror.sync().unwrap();
            prop_assert_eq!(read_tree(&target), read_tree(&source));

            let second = mirror.sync().unwrap();
            prop_assert_eq!(second.copied, 0);
            prop_assert_eq!(second.deleted, 0);
            Ok(())
        })
        .unwrap();
}

#[derive(Debug, Clone)]
enum Tamper {
    Delete(i64),
    Insert(i64),
    Rename(i64, String),
    Disable(i64),
    NullCode(i64),
}

fn tamper_strategy() -> impl Strategy<Value = Tamper> {
    prop_oneof![
        (1i64..=3).prop_map(Tamper::Delete),
        (4i64..=9).prop_map(Tamper::Insert),
        ((1i64..=3), "[A-Z][a-z]{0,6}").prop_map(|(id, name)| Tamper::Rename(id, name)),
        (1i64..=3).prop_map(Tamper::Disable),
        (1i64..=3).prop_map(Tamper::NullCode),
    ]
}

/// Any sequence of row edits is undone by a single restore cycle.
#[test]
fn test_restore_converges_after_arbitrary_tampering() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut runner = TestRunner::new(Config {
        cases: 24,
        ..Config::default()
    });

    runner
        .run(&prop::collection::vec(tamper_strategy(), 0..8), |tampers| {
            runtime.block_on(async {
                let dir = TempDir::new().unwrap();
                let url = sqlite_url(&dir, "faka.db");
                let db = connect(&url).await;
                seed_pay_table(db.as_ref()).await;
                let restore = RestoreReconciler::initialize(
                    "restore",
                    connect(&url).await,
                    pay_table(),
                    AuditLog::disabled("restore"),
                )
                .await
                .unwrap();

                for tamper in &tampers {
                    let (sql, params): (&str, Vec<Scalar>) = match tamper {
                        Tamper::Delete(id) => ("DELETE FROM acg_pay WHERE id = ?", vec![Scalar::Int(*id)]),
                        Tamper::Insert(id) => (
                            "INSERT OR REPLACE INTO acg_pay (id, name, enabled) VALUES (?, 'Rogue', 1)",
                            vec![Scalar::Int(*id)],
                        ),
                        Tamper::Rename(id, name) => (
                            "UPDATE acg_pay SET name = ? WHERE id = ?",
                            vec![name.as_str().into(), Scalar::Int(*id)],
                        ),
                        Tamper::Disable(id) => ("UPDATE acg_pay SET enabled = 0 WHERE id = ?", vec![Scalar::Int(*id)]),
                        Tamper::NullCode(id) => ("UPDATE acg_pay SET code = NULL WHERE id = ?", vec![Scalar::Int(*id)]),
                    };
                    exec(db.as_ref(), sql, params).await;
                }

                restore.restore_cycle().await.unwrap();
                let live = RowSnapshot::capture(db.as_ref(), &pay_table()).await.unwrap();
                prop_assert_eq!(&live, restore.baseline());
                Ok(())
            })
        })
        .unwrap();
}
