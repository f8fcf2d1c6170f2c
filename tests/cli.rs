use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::{TempDir, tempdir};

fn bin(dir: &TempDir) -> Command {
    let config = dir.path().join("config.toml");
    if !config.exists() {
        std::fs::write(&config, "").unwrap();
    }

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cipherlab"));
    cmd.env("CIPHERLAB_CONFIG", &config)
        .env_remove("CIPHERLAB_PASSPHRASE")
        .env_remove("GEMINI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn encrypt_password(dir: &TempDir, text: &str, passphrase: &str) -> String {
    let out = bin(dir)
        .env("CIPHERLAB_PASSPHRASE", passphrase)
        .args(["encrypt", "--mode", "password", text])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    String::from_utf8(out).unwrap().trim().to_string()
}

fn keygen(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let public = dir.path().join("public.pem");
    let private = dir.path().join("private.pem");

    bin(dir)
        .arg("keygen")
        .arg("--public-out")
        .arg(&public)
        .arg("--private-out")
        .arg(&private)
        .assert()
        .success();

    (public, private)
}

#[test]
fn password_roundtrip() {
    let dir = tempdir().unwrap();
    let envelope = encrypt_password(&dir, "hello world", "correct-horse");
    assert!(!envelope.contains("hello world"));

    bin(&dir)
        .env("CIPHERLAB_PASSPHRASE", "correct-horse")
        .args(["decrypt", "--mode", "password", &envelope])
        .assert()
        .success()
        .stdout("hello world\n");
}

#[test]
fn wrong_passphrase_fails() {
    let dir = tempdir().unwrap();
    let envelope = encrypt_password(&dir, "hello world", "correct-horse");

    bin(&dir)
        .env("CIPHERLAB_PASSPHRASE", "wrong")
        .args(["decrypt", "--mode", "password", &envelope])
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("authentication failed"));
}

#[test]
fn passphrase_can_be_piped() {
    let dir = tempdir().unwrap();
    let envelope = encrypt_password(&dir, "piped", "pw with spaces ");

    bin(&dir)
        .args(["decrypt", "--mode", "password", &envelope])
        .write_stdin("pw with spaces \n")
        .assert()
        .success()
        .stdout("piped\n");
}

#[test]
fn piped_passphrase_requires_text_argument() {
    let dir = tempdir().unwrap();

    bin(&dir)
        .args(["encrypt", "--mode", "password"])
        .write_stdin("pw\nsome text\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be passed as an argument"));
}

#[test]
fn empty_input_is_rejected() {
    let dir = tempdir().unwrap();

    bin(&dir)
        .env("CIPHERLAB_PASSPHRASE", "pw")
        .args(["encrypt", "--mode", "password", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input data cannot be empty"));
}

#[test]
fn explain_prints_steps_to_stderr() {
    let dir = tempdir().unwrap();

    bin(&dir)
        .env("CIPHERLAB_PASSPHRASE", "pw")
        .args(["--explain", "encrypt", "--mode", "password", "hi"])
        .assert()
        .success()
        .stderr(predicate::str::contains("> 2. Key Derivation (PBKDF2)"));
}

#[test]
fn envelope_is_written_to_output_file() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("msg.txt");

    bin(&dir)
        .env("CIPHERLAB_PASSPHRASE", "pw")
        .args(["encrypt", "--mode", "password", "--output"])
        .arg(&out)
        .arg("to a file")
        .assert()
        .success()
        .stdout("");

    let envelope = std::fs::read_to_string(&out).unwrap();

    bin(&dir)
        .env("CIPHERLAB_PASSPHRASE", "pw")
        .args(["decrypt", "--mode", "password", &envelope])
        .assert()
        .success()
        .stdout("to a file\n");
}

#[test]
fn hybrid_roundtrip_with_key_files() {
    let dir = tempdir().unwrap();
    let (public, private) = keygen(&dir);

    let public_pem = std::fs::read_to_string(&public).unwrap();
    assert!(public_pem.starts_with("-----BEGIN PUBLIC KEY-----"));
    assert!(private_key_is_owner_only(&private));

    let out = bin(&dir)
        .args(["encrypt", "--mode", "hybrid", "--public-key"])
        .arg(&public)
        .arg("secret msg")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let envelope = String::from_utf8(out).unwrap();

    // envelope arrives on stdin, trailing newline included
    bin(&dir)
        .args(["decrypt", "--mode", "hybrid", "--private-key"])
        .arg(&private)
        .write_stdin(envelope.clone())
        .assert()
        .success()
        .stdout("secret msg\n");

    // a password-mode decrypt of a hybrid envelope names the mismatch
    bin(&dir)
        .env("CIPHERLAB_PASSPHRASE", "pw")
        .args(["decrypt", "--mode", "password", envelope.trim()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("corrupt payload"));

    // keys are never overwritten by accident
    bin(&dir)
        .arg("keygen")
        .arg("--private-out")
        .arg(&private)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn hybrid_encrypt_without_public_key_fails() {
    let dir = tempdir().unwrap();

    bin(&dir)
        .args(["encrypt", "--mode", "hybrid", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("recipient public key is required"));
}

#[test]
fn malformed_public_key_file_fails() {
    let dir = tempdir().unwrap();
    let public = dir.path().join("bogus.pem");
    std::fs::write(&public, "not a key").unwrap();

    bin(&dir)
        .args(["encrypt", "--mode", "hybrid", "--public-key"])
        .arg(&public)
        .arg("text")
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed key text"));
}

#[test]
fn ask_without_api_key_prints_fallback() {
    let dir = tempdir().unwrap();

    bin(&dir)
        .args(["ask", "what is a salt?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not configured"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[tutor]\ntimeout_secs = 0\n").unwrap();

    bin(&dir)
        .args(["ask", "hi?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("timeout_secs"));
}

#[cfg(unix)]
fn private_key_is_owner_only(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777 == 0o600
}

#[cfg(not(unix))]
fn private_key_is_owner_only(path: &Path) -> bool {
    path.exists()
}
