//! Shared fixtures for integration tests
//!
//! Directory trees are described as `(relative path, content)` pairs; database
//! tests use a SQLite file inside a `TempDir` so that a second handle (the
//! "tamperer") sees the same data as the reconciler under test.

use safeguard::store::{RowStore, Scalar, SqliteStore, Statement, TableRef};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Serializes tests that touch process environment variables
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

/// Every regular file under `root`, keyed by `/`-separated relative path
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    if !root.exists() {
        return BTreeMap::new();
    }
    WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (relative, fs::read(entry.path()).unwrap())
        })
        .collect()
}

pub fn sqlite_url(dir: &TempDir, name: &str) -> String {
    format!("sqlite://{}", dir.path().join(name).display())
}

pub async fn connect(url: &str) -> Box<dyn RowStore> {
    Box::new(SqliteStore::connect(url).await.unwrap())
}

pub async fn exec(store: &dyn RowStore, sql: &str, params: Vec<Scalar>) -> u64 {
    store
        .execute(&Statement {
            sql: sql.to_string(),
            params,
        })
        .await
        .unwrap()
}

pub fn pay_table() -> TableRef {
    TableRef::new("acg_pay", "id").unwrap()
}

pub fn manage_table() -> TableRef {
    TableRef::new("acg_manage", "id").unwrap()
}

/// `acg_pay` with three payment channels, all enabled
pub async fn seed_pay_table(store: &dyn RowStore) {
    exec(
        store,
        "CREATE TABLE acg_pay (id INTEGER PRIMARY KEY, name TEXT NOT NULL, code TEXT, \
         enabled INTEGER NOT NULL, fee REAL, updated_at TEXT)",
        vec![],
    )
    .await;
    for (id, name, code) in [(1, "Alipay", "alipay"), (2, "WeChat", "wxpay"), (3, "USDT", "usdt")] {
        exec(
            store,
            "INSERT INTO acg_pay (id, name, code, enabled, fee, updated_at) VALUES (?, ?, ?, 1, 0.006, NULL)",
            vec![Scalar::Int(id), name.into(), code.into()],
        )
        .await;
    }
}

/// `acg_manage` with the sentinel admin plus `extra` injected accounts
pub async fn seed_manage_table(store: &dyn RowStore, extra: &[i64]) {
    exec(
        store,
        "CREATE TABLE acg_manage (id INTEGER PRIMARY KEY, email TEXT NOT NULL, password TEXT, \
         login_time INTEGER)",
        vec![],
    )
    .await;
    for id in std::iter::once(&1).chain(extra) {
        exec(
            store,
            "INSERT INTO acg_manage (id, email, password, login_time) VALUES (?, ?, ?, ?)",
            vec![
                Scalar::Int(*id),
                format!("admin{}@example.com", id).into(),
                Scalar::Bytes(vec![0xde, 0xad, *id as u8]),
                Scalar::Null,
            ],
        )
        .await;
    }
}
