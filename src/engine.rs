//! Assembly of reconcilers from configuration

use crate::audit::AuditLog;
use crate::config::{PairState, SafeguardConfig};
use crate::error::ReconcileError;
use crate::mirror::DirectoryMirror;
use crate::scheduler::Scheduler;
use crate::store::{connect_store, RowKey, RowStore, TableRef};
use crate::table::{PruneReconciler, RestoreReconciler};
use std::path::Path;
use tracing::{debug, info, warn};

fn fatal(reconciler: &str, reason: impl ToString) -> ReconcileError {
    ReconcileError::FatalInit {
        reconciler: reconciler.to_string(),
        reason: reason.to_string(),
    }
}

fn open_audit(name: &str, path: &Path) -> Result<AuditLog, ReconcileError> {
    AuditLog::open(name, path)
        .map_err(|e| fatal(name, format!("cannot open audit log {:?}: {}", path, e)))
}

async fn open_store(name: &str, config: &SafeguardConfig) -> Result<Box<dyn RowStore>, ReconcileError> {
    let store = connect_store(&config.store.target())
        .await
        .map_err(|e| fatal(name, e))?;
    store.ping().await.map_err(|e| fatal(name, e))?;
    Ok(store)
}

/// Build every enabled reconciler.
///
/// Table reconcilers each get their own store connection. Any failure here,
/// including the restore baseline capture, is [`ReconcileError::FatalInit`].
pub async fn build_scheduler(config: &SafeguardConfig) -> Result<Scheduler, ReconcileError> {
    let mut scheduler = Scheduler::new();

    // Every pair appends through one shared handle on the mirror audit file.
    let mut mirror_audit: Option<AuditLog> = None;
    for pair in &config.mirror.pairs {
        let name = format!("mirror:{}", pair.name);
        match pair.state() {
            PairState::Disabled => {
                debug!(reconciler = %name, "Mirror pair not configured, skipping");
            }
            PairState::Incomplete => {
                warn!(
                    reconciler = %name,
                    source = %pair.source.display(),
                    target = %pair.target.display(),
                    "Mirror pair has only one path set, skipping"
                );
            }
            PairState::Ready => {
                let audit = match &mirror_audit {
                    Some(shared) => shared.for_reconciler(&name),
                    None => {
                        let opened = open_audit(&name, &config.mirror.audit_log)?;
                        mirror_audit = Some(opened.clone());
                        opened
                    }
                };
                let mirror = DirectoryMirror::new(&name, &pair.source, &pair.target, audit);
                scheduler.add(Box::new(mirror), config.mirror.interval());
            }
        }
    }

    if config.prune.enabled {
        let name = "prune";
        let table = TableRef::new(&config.prune.table, &config.prune.key_column)
            .map_err(|e| fatal(name, e))?;
        let audit = open_audit(name, &config.prune.audit_log)?;
        let store = open_store(name, config).await?;
        let reconciler = PruneReconciler::new(
            name,
            store,
            table,
            RowKey::Int(config.prune.sentinel_id),
            audit,
        );
        scheduler.add(Box::new(reconciler), config.prune.interval());
    }

    if config.restore.enabled {
        let name = "restore";
        let table = TableRef::new(&config.restore.table, &config.restore.key_column)
            .map_err(|e| fatal(name, e))?;
        let audit = open_audit(name, &config.restore.audit_log)?;
        let store = open_store(name, config).await?;
        let reconciler = RestoreReconciler::initialize(name, store, table, audit).await?;
        scheduler.add(Box::new(reconciler), config.restore.interval());
    }

    info!(reconcilers = scheduler.len(), "Reconcilers ready");
    Ok(scheduler)
}
