//! Put command: publish a local credential to etcd.

use crate::config::ConnectionArgs;
use certsync_engine::{
    build_client_config, BlockingHttpClient, EtcdTransport, KvStore, PublishEngine, SyncConfig,
};
use certsync_storage::{FileBackend, FileStore};
use std::io::Write;
use std::path::Path;

/// Publishes `in_cert` and `in_key` under `etcd_key`.
pub fn run(
    connection: &ConnectionArgs,
    etcd_key: &str,
    in_cert: &Path,
    in_key: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = connection.resolve()?;
    let config = SyncConfig::default().with_request_timeout(connection.timeout());

    let tls = build_client_config(&target.tls)?;
    let client = BlockingHttpClient::new(tls, &config)?;
    let kv = EtcdTransport::new(&target.endpoint, client);
    let engine = PublishEngine::new(config, kv, FileBackend::new());

    execute(&engine, etcd_key, in_cert, in_key, &mut std::io::stdout())
}

/// Publishes through an existing engine and reports to `out`.
pub fn execute<K: KvStore, F: FileStore>(
    engine: &PublishEngine<K, F>,
    etcd_key: &str,
    in_cert: &Path,
    in_key: &Path,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = engine.publish(etcd_key, in_cert, in_key)?;
    writeln!(out, "Certificate and private key successfully put to etcd.")?;
    writeln!(
        out,
        "Key: {}, Revision: {}, Payload: {} bytes",
        report.key, report.revision, report.bytes
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use certsync_engine::{Credential, MemoryKvStore};
    use certsync_storage::InMemoryStore;
    use certsync_testkit::fixtures::pem;

    #[test]
    fn publishes_and_reports() {
        let files = InMemoryStore::new()
            .with_file("/in/tls.crt", pem::RSA_CERT)
            .with_file("/in/tls.key", pem::RSA_KEY);
        let engine = PublishEngine::new(SyncConfig::default(), MemoryKvStore::new(), files);

        let mut out = Vec::new();
        execute(
            &engine,
            "/service/pg/tls",
            Path::new("/in/tls.crt"),
            Path::new("/in/tls.key"),
            &mut out,
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Certificate and private key successfully put to etcd.\n"));
        assert!(text.contains("Key: /service/pg/tls, Revision: 1"));

        let stored = engine.kv().value("/service/pg/tls").unwrap();
        let credential = Credential::decode(&stored).unwrap();
        assert_eq!(credential.certificate, pem::RSA_CERT);
    }

    #[test]
    fn missing_input_reports_nothing() {
        let engine = PublishEngine::new(
            SyncConfig::default(),
            MemoryKvStore::new(),
            InMemoryStore::new(),
        );
        let mut out = Vec::new();
        assert!(execute(
            &engine,
            "k1",
            Path::new("/in/tls.crt"),
            Path::new("/in/tls.key"),
            &mut out,
        )
        .is_err());
        assert!(out.is_empty());
    }
}
