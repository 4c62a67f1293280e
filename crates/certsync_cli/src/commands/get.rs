//! Get command: pull a newer credential from etcd.

use crate::config::ConnectionArgs;
use certsync_engine::{
    build_client_config, BlockingHttpClient, EtcdTransport, KvStore, SyncConfig, SyncEngine,
    SyncOutcome,
};
use certsync_storage::{FileBackend, FileStore};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Runs one synchronization pass against the configured etcd endpoint.
pub fn run(
    connection: &ConnectionArgs,
    etcd_key: &str,
    out_cert: &Path,
    out_key: &Path,
    ledger: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = connection.resolve()?;
    let config = SyncConfig::default()
        .with_request_timeout(connection.timeout())
        .with_ledger_path(ledger);

    let tls = build_client_config(&target.tls)?;
    let client = BlockingHttpClient::new(tls, &config)?;
    let kv = EtcdTransport::new(&target.endpoint, client);
    let engine = SyncEngine::new(config, kv, FileBackend::new());

    execute(&engine, etcd_key, out_cert, out_key, &mut std::io::stdout())
}

/// Runs a pass on an existing engine and reports the outcome to `out`.
pub fn execute<K: KvStore, F: FileStore>(
    engine: &SyncEngine<K, F>,
    etcd_key: &str,
    out_cert: &Path,
    out_key: &Path,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = engine.sync(etcd_key, out_cert, out_key)?;
    writeln!(out, "{outcome}")?;
    if let SyncOutcome::Done { fingerprint, .. } = &outcome {
        writeln!(out, "New certificate and private key successfully received.")?;
        writeln!(out, "SHA-256 fingerprint: {fingerprint}")?;
    }
    Ok(())
}
