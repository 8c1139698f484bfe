//! End-to-end file encryption round-trips through the facade.

use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;
use tempfile::TempDir;

use ssp_core::config::{EngineConfig, KdfConfig, SuiteConfig};
use ssp_core::SspError;
use ssp_crypto::entropy::SeededEntropy;
use ssp_engine::CryptoEngine;

// Above the security floor but quick enough for CI.
fn fast_config() -> SuiteConfig {
    SuiteConfig {
        kdf: KdfConfig {
            mem_cost_kib: 8192,
            time_cost: 2,
            parallelism: 1,
        },
        engine: EngineConfig { chunk_size: 4096 },
        ..Default::default()
    }
}

fn test_engine(seed: u64) -> CryptoEngine {
    CryptoEngine::new(fast_config(), Arc::new(SeededEntropy::new(seed)))
}

fn write_test_file(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write test file");
    path
}

#[test]
fn multi_chunk_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let engine = test_engine(1);
    let passphrase = SecretString::from("correct horse battery staple");

    // ~5.5 chunks at the 4 KiB test chunk size
    let original: Vec<u8> = (0..22_222u32).map(|i| (i % 251) as u8).collect();
    let src = write_test_file(tmp.path(), "report.pdf", &original);
    let enc = tmp.path().join("report.pdf.ssp");
    let dec = tmp.path().join("restored.pdf");

    let report = engine
        .encrypt_file(&src, &enc, &passphrase, None, None)
        .expect("encryption should succeed");
    assert_eq!(report.plaintext_bytes, original.len() as u64);
    assert_eq!(report.chunks, 6);

    let restored = engine
        .decrypt_file(&enc, &dec, &passphrase, None, None)
        .expect("decryption should succeed");
    assert_eq!(restored.plaintext_bytes, original.len() as u64);
    assert_eq!(restored.original_name.as_deref(), Some("report.pdf"));

    assert_eq!(std::fs::read(&dec).unwrap(), original);
}

#[test]
fn empty_file_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let engine = test_engine(2);
    let passphrase = SecretString::from("pw for empty");

    let src = write_test_file(tmp.path(), "empty.bin", b"");
    let enc = tmp.path().join("empty.bin.ssp");
    let dec = tmp.path().join("empty.out");

    engine.encrypt_file(&src, &enc, &passphrase, None, None).unwrap();
    let report = engine.decrypt_file(&enc, &dec, &passphrase, None, None).unwrap();

    assert_eq!(report.plaintext_bytes, 0);
    assert_eq!(std::fs::read(&dec).unwrap(), b"");
}

#[test]
fn wrong_passphrase_fails_and_leaves_no_output() {
    let tmp = TempDir::new().unwrap();
    let engine = test_engine(3);

    let src = write_test_file(tmp.path(), "secret.txt", b"the payload under test");
    let enc = tmp.path().join("secret.txt.ssp");
    let dec = tmp.path().join("secret.out");

    engine
        .encrypt_file(&src, &enc, &SecretString::from("right one"), None, None)
        .unwrap();

    let result = engine.decrypt_file(&enc, &dec, &SecretString::from("wrong one"), None, None);
    assert!(matches!(result, Err(SspError::IntegrityViolation)));
    assert!(!dec.exists(), "failed decryption must not leave an output file");
}

#[test]
fn failed_decrypt_preserves_existing_destination() {
    let tmp = TempDir::new().unwrap();
    let engine = test_engine(4);

    let src = write_test_file(tmp.path(), "doc.txt", b"new contents");
    let enc = tmp.path().join("doc.txt.ssp");
    let dec = write_test_file(tmp.path(), "doc.out", b"precious old contents");

    engine
        .encrypt_file(&src, &enc, &SecretString::from("pw"), None, None)
        .unwrap();
    let result = engine.decrypt_file(&enc, &dec, &SecretString::from("not pw"), None, None);

    assert!(result.is_err());
    assert_eq!(
        std::fs::read(&dec).unwrap(),
        b"precious old contents",
        "a failed decrypt must never replace a valid file"
    );
}

#[test]
fn same_file_twice_yields_different_envelopes() {
    let tmp = TempDir::new().unwrap();
    let engine = test_engine(5);
    let passphrase = SecretString::from("pw");

    let src = write_test_file(tmp.path(), "dup.txt", b"identical plaintext");
    let enc_a = tmp.path().join("a.ssp");
    let enc_b = tmp.path().join("b.ssp");

    engine.encrypt_file(&src, &enc_a, &passphrase, None, None).unwrap();
    engine.encrypt_file(&src, &enc_b, &passphrase, None, None).unwrap();

    assert_ne!(
        std::fs::read(&enc_a).unwrap(),
        std::fs::read(&enc_b).unwrap(),
        "fresh salt and nonces must differ across envelopes"
    );
}

#[test]
fn progress_events_reach_done() {
    use std::sync::Mutex;

    use ssp_core::progress::{Phase, ProgressFn};

    let tmp = TempDir::new().unwrap();
    let engine = test_engine(6);
    let src = write_test_file(tmp.path(), "p.bin", &vec![7u8; 4096 * 3]);
    let enc = tmp.path().join("p.ssp");

    let phases: Arc<Mutex<Vec<Phase>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = phases.clone();
    let progress: ProgressFn = Box::new(move |event| {
        sink.lock().unwrap().push(event.phase);
    });

    engine
        .encrypt_file(&src, &enc, &SecretString::from("pw"), Some(&progress), None)
        .unwrap();

    let phases = phases.lock().unwrap();
    assert_eq!(phases.first(), Some(&Phase::Derive));
    assert_eq!(phases.last(), Some(&Phase::Done));
    assert!(phases.contains(&Phase::Process));
    assert!(phases.contains(&Phase::Commit));
}

// Full-size run: a 10 MB file under a realistic passphrase, wrong
// passphrase rejected, exact byte recovery with the right one.
#[test]
fn ten_megabyte_scenario() {
    let tmp = TempDir::new().unwrap();
    let engine = CryptoEngine::new(
        SuiteConfig {
            kdf: KdfConfig {
                mem_cost_kib: 8192,
                time_cost: 2,
                parallelism: 1,
            },
            ..Default::default() // 1 MiB chunks
        },
        Arc::new(SeededEntropy::new(7)),
    );
    let passphrase = SecretString::from("correct horse battery staple");

    let original: Vec<u8> = (0..10 * 1024 * 1024u32).map(|i| (i * 31 % 256) as u8).collect();
    let src = write_test_file(tmp.path(), "big.bin", &original);
    let enc = tmp.path().join("big.ssp");
    let dec = tmp.path().join("big.out");

    let report = engine.encrypt_file(&src, &enc, &passphrase, None, None).unwrap();
    assert_eq!(report.chunks, 10);

    let wrong = engine.decrypt_file(&enc, &dec, &SecretString::from("incorrect horse"), None, None);
    assert!(matches!(wrong, Err(SspError::IntegrityViolation)));
    assert!(!dec.exists());

    engine.decrypt_file(&enc, &dec, &passphrase, None, None).unwrap();
    assert_eq!(std::fs::read(&dec).unwrap(), original);
}
