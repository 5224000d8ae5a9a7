//! End-to-end directory mirroring

use super::test_utils::{read_tree, write_tree};
use safeguard::audit::AuditLog;
use safeguard::error::SyncError;
use safeguard::mirror::{DirectoryMirror, SyncReport};
use std::fs;
use tempfile::TempDir;

fn mirror(dir: &TempDir) -> (DirectoryMirror, AuditLog) {
    let audit = AuditLog::in_memory("mirror:pay");
    let mirror = DirectoryMirror::new(
        "mirror:pay",
        dir.path().join("backup"),
        dir.path().join("www"),
        audit.clone(),
    );
    (mirror, audit)
}

#[test]
fn test_changed_file_is_restored() {
    let dir = TempDir::new().unwrap();
    let (mirror, _) = mirror(&dir);
    write_tree(mirror.source(), &[("a.txt", "hello")]);
    write_tree(mirror.target(), &[("a.txt", "world")]);

    let report = mirror.sync().unwrap();

    assert_eq!(fs::read_to_string(mirror.target().join("a.txt")).unwrap(), "hello");
    assert_eq!(
        report,
        SyncReport {
            total: 1,
            copied: 1,
            unchanged: 0,
            deleted: 0
        }
    );
}

#[test]
fn test_extra_file_deleted_missing_file_copied() {
    let dir = TempDir::new().unwrap();
    let (mirror, audit) = mirror(&dir);
    write_tree(mirror.source(), &[("a.txt", "same"), ("b.txt", "new")]);
    write_tree(mirror.target(), &[("a.txt", "same"), ("c.txt", "planted")]);

    let report = mirror.sync().unwrap();

    assert_eq!(read_tree(mirror.target()), read_tree(mirror.source()));
    assert_eq!(report.copied, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.deleted, 1);

    let lines = audit.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| !l.contains("a.txt")));
    assert!(lines[0].contains("file_copied") && lines[0].contains("b.txt"));
    assert!(lines[1].contains("file_deleted") && lines[1].contains("c.txt"));
}

#[test]
fn test_second_sync_copies_nothing() {
    let dir = TempDir::new().unwrap();
    let (mirror, _) = mirror(&dir);
    write_tree(
        mirror.source(),
        &[
            ("index.php", "<?php echo 1;"),
            ("pay/alipay/notify.php", "<?php notify();"),
            ("pay/wxpay/config.json", "{}"),
        ],
    );
    write_tree(mirror.target(), &[("pay/alipay/notify.php", "<?php steal();")]);

    let first = mirror.sync().unwrap();
    let second = mirror.sync().unwrap();

    assert_eq!(first.copied, 3);
    assert_eq!(second.copied, 0);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.unchanged, 3);
}

#[test]
fn test_same_size_different_content_detected() {
    let dir = TempDir::new().unwrap();
    let (mirror, _) = mirror(&dir);
    write_tree(mirror.source(), &[("key.pem", "AAAA")]);
    write_tree(mirror.target(), &[("key.pem", "BBBB")]);

    let report = mirror.sync().unwrap();

    assert_eq!(report.copied, 1);
    assert_eq!(fs::read_to_string(mirror.target().join("key.pem")).unwrap(), "AAAA");
}

#[test]
fn test_empty_source_empties_target() {
    let dir = TempDir::new().unwrap();
    let (mirror, _) = mirror(&dir);
    fs::create_dir_all(mirror.source()).unwrap();
    write_tree(mirror.target(), &[("shell.php", "<?php system($_GET[c]);"), ("x/y.txt", "y")]);

    let report = mirror.sync().unwrap();

    assert_eq!(report.deleted, 2);
    assert!(read_tree(mirror.target()).is_empty());
}

#[test]
fn test_vanished_source_never_wipes_target() {
    let dir = TempDir::new().unwrap();
    let (mirror, _) = mirror(&dir);
    write_tree(mirror.target(), &[("a.txt", "keep")]);

    let err = mirror.sync().unwrap_err();

    assert!(matches!(err, SyncError::MissingSource(_)));
    assert_eq!(fs::read_to_string(mirror.target().join("a.txt")).unwrap(), "keep");
}

#[cfg(unix)]
#[test]
fn test_planted_link_removed_and_linked_source_kept() {
    let dir = TempDir::new().unwrap();
    let (mirror, audit) = mirror(&dir);
    write_tree(&dir.path().join("shared"), &[("config.php", "db=faka")]);
    write_tree(mirror.source(), &[("index.php", "<?php")]);
    std::os::unix::fs::symlink(
        dir.path().join("shared/config.php"),
        mirror.source().join("config.php"),
    )
    .unwrap();
    write_tree(mirror.target(), &[("index.php", "<?php"), ("config.php", "db=faka")]);
    fs::write(dir.path().join("shell.php"), "<?php system($_GET['c']);").unwrap();
    std::os::unix::fs::symlink("../shell.php", mirror.target().join("shell.php")).unwrap();

    let report = mirror.sync().unwrap();

    assert_eq!(
        report,
        SyncReport {
            total: 2,
            copied: 0,
            unchanged: 2,
            deleted: 1,
        }
    );
    assert!(fs::symlink_metadata(mirror.target().join("shell.php")).is_err());
    assert_eq!(
        fs::read_to_string(mirror.target().join("config.php")).unwrap(),
        "db=faka"
    );
    assert!(audit.lines().iter().any(|l| l.contains("file_deleted") && l.contains("shell.php")));
}
