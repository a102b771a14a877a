// If code coverage tool `cargo-llvm-cov` is running with the nightly toolchain,
// enable the unstable “coverage” attribute. Every `#[cfg(test)]` module is
// annotated with `#[cfg_attr(coverage_nightly, coverage(off))]`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod application;
pub mod state;

use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use application::config::cli_args;
use tracing::info;

use crate::api::export::WalletForge;
use crate::application::config::data_directory::DataDirectory;
use crate::application::database::KvStore;
use crate::application::database::LevelDbStore;
use crate::application::database::MemoryStore;
use crate::application::locks::tokio as sync_tokio;

/// Opens the wallet store selected by `cli_args` and returns a forge over it.
///
/// With `--in-memory` nothing touches the disk. Otherwise the LevelDB
/// database lives in the data directory, which is created if missing.
pub async fn initialize(cli_args: &cli_args::Args) -> Result<WalletForge> {
    let store: Arc<dyn KvStore> = if cli_args.in_memory {
        info!("using in-memory wallet store");
        Arc::new(MemoryStore::with_lock_callback(Some(
            LOG_TOKIO_LOCK_EVENT_CB,
        )))
    } else {
        let data_directory = DataDirectory::get(cli_args.data_dir.clone())?;
        data_directory.create_dir_if_not_exists().await?;
        let db_path = data_directory.wallet_database_dir_path();
        let leveldb_store = LevelDbStore::open(&db_path, Some(LOG_TOKIO_LOCK_EVENT_CB))
            .await
            .with_context(|| format!("Failed to open wallet database {}", db_path.display()))?;
        Arc::new(leveldb_store)
    };

    Ok(WalletForge::new(store, cli_args.entropy_bits))
}

pub(crate) fn log_tokio_lock_event_cb(lock_event: sync_tokio::LockEvent) {
    #[cfg(feature = "log-lock_events")]
    log_tokio_lock_event(&lock_event);

    if lock_event.acquisition() == sync_tokio::LockAcquisition::Write {
        log_slow_write_lock(&lock_event);
    }
}

// very verbose.  only useful when debugging lock acquisitions.
#[cfg(feature = "log-lock_events")]
pub(crate) fn log_tokio_lock_event(lock_event: &sync_tokio::LockEvent) {
    let tokio_id = match tokio::task::try_id() {
        Some(id) => format!("{}", id),
        None => "?".to_string(),
    };

    let waited_for_acquire_str = match (lock_event.try_acquire_at(), lock_event.acquire_at()) {
        (Some(t), Some(a)) => format!(
            "\n\t|-- waited for acquire: {} secs",
            a.duration_since(t).as_secs_f32()
        ),
        _ => String::default(),
    };
    let held_str = match lock_event.acquire_at() {
        Some(t) if matches!(lock_event, sync_tokio::LockEvent::Release { .. }) => {
            format!("\n\t|-- held: {} secs", t.elapsed().as_secs_f32())
        }
        _ => String::default(),
    };

    let info = lock_event.info();

    tracing::trace!(
        "{} tokio lock `{}` of type `{}` for `{}` by\n\t|-- thread {:?}\n\t|-- tokio task {}{}{}\n\t|--",
        lock_event.event_type_name(),
        info.name().unwrap_or("?"),
        info.lock_type(),
        lock_event.acquisition(),
        std::thread::current().id(),
        tokio_id,
        waited_for_acquire_str,
        held_str,
    );
}

/// Warns when the store's write lock was held longer than
/// `LOG_SLOW_WRITE_LOCK_THRESHOLD` seconds (default 0.1). A write lock spans
/// a whole commit, including the batch write of a [`LevelDbStore`].
pub(crate) fn log_slow_write_lock(event: &sync_tokio::LockEvent) {
    if !matches!(event, sync_tokio::LockEvent::Release { .. }) {
        return;
    }
    let Some(acquired_at) = event.acquire_at() else {
        return;
    };

    let max_duration_secs = std::env::var("LOG_SLOW_WRITE_LOCK_THRESHOLD")
        .ok()
        .and_then(|t| t.parse::<f32>().ok())
        .unwrap_or(0.1);

    let held = acquired_at.elapsed().as_secs_f32();
    if held > max_duration_secs {
        tracing::warn!(
            "write-lock on `{}` held for {} seconds. (exceeds max: {} secs)",
            event.info().name().unwrap_or("?"),
            held,
            max_duration_secs,
        );
    }
}

const LOG_TOKIO_LOCK_EVENT_CB: sync_tokio::LockCallbackFn = log_tokio_lock_event_cb;
