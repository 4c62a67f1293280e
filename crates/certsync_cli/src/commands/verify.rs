//! Verify command: check a local certificate/key pair.

use certsync_engine::validator::{describe_certificate, validate};
use std::io::Write;
use std::path::Path;

/// Validates the pair at `cert` and `key` and prints a summary.
pub fn run(cert: &Path, key: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let certificate = std::fs::read_to_string(cert)
        .map_err(|e| format!("failed to read {}: {e}", cert.display()))?;
    let private_key = std::fs::read_to_string(key)
        .map_err(|e| format!("failed to read {}: {e}", key.display()))?;

    execute(&certificate, &private_key, &mut std::io::stdout())
}

/// Validates PEM text and writes the report to `out`.
pub fn execute(
    certificate: &str,
    private_key: &str,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = describe_certificate(certificate)?;
    writeln!(out, "Subject:     {}", summary.subject)?;
    writeln!(out, "Issuer:      {}", summary.issuer)?;
    writeln!(out, "Not before:  {}", summary.not_before)?;
    writeln!(out, "Not after:   {}", summary.not_after)?;
    if let Some(algorithm) = summary.key_algorithm {
        writeln!(out, "Key:         {algorithm}")?;
    }
    writeln!(out, "Fingerprint: {}", summary.fingerprint)?;

    match validate(certificate, private_key) {
        Ok(_) => {
            writeln!(out, "Status:      OK")?;
            Ok(())
        }
        Err(e) => {
            writeln!(out, "Status:      INVALID ({e})")?;
            Err(e.into())
        }
    }
}
