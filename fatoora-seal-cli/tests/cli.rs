use std::path::PathBuf;
use std::process::{Command, Output};

fn cli_exe() -> &'static str {
    env!("CARGO_BIN_EXE_fatoora-seal")
}

fn fixture(parts: &[&str]) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("fatoora-seal")
        .join("tests")
        .join("fixtures");
    for part in parts {
        path.push(part);
    }
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(cli_exe())
        .args(args)
        .output()
        .expect("run cli")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf8 stdout")
}

fn line_value(text: &str, key: &str) -> String {
    text.lines()
        .find_map(|line| line.strip_prefix(key))
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| panic!("missing {key} in {text}"))
}

fn sign_first(output_path: &str) -> Output {
    let invoice = fixture(&["invoices", "simplified-invoice.xml"]);
    let cert = fixture(&["certs", "signing-cert.pem"]);
    let key = fixture(&["keys", "signing-key.pem"]);
    run(&[
        "sign",
        "--invoice",
        invoice.to_str().expect("path"),
        "--cert",
        cert.to_str().expect("path"),
        "--key",
        key.to_str().expect("path"),
        "--first",
        "--output",
        output_path,
    ])
}

#[test]
fn hash_command_prints_base64_digest() {
    let invoice = fixture(&["invoices", "simplified-invoice.xml"]);
    let output = run(&["hash", "--invoice", invoice.to_str().expect("path")]);
    assert!(output.status.success(), "{output:?}");
    let hash = stdout(&output);
    assert_eq!(hash.trim().len(), 44);
    assert!(hash.trim().ends_with('='));
}

#[test]
fn sign_then_verify_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let signed_path = dir.path().join("signed.xml");
    let signed_path = signed_path.to_str().expect("path");

    let output = sign_first(signed_path);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    let invoice_hash = line_value(&text, "invoice_hash:");
    let qr_code = line_value(&text, "qr_code:");

    let signed_xml = std::fs::read_to_string(signed_path).expect("signed xml");
    assert!(signed_xml.contains(&qr_code));
    assert!(signed_xml.contains(&invoice_hash));

    let verify = run(&["verify", "--invoice", signed_path, "--hash", &invoice_hash]);
    assert!(verify.status.success(), "{verify:?}");
    assert_eq!(stdout(&verify).trim(), "valid");

    let decoded = run(&["qr", "--payload", &qr_code]);
    assert!(decoded.status.success(), "{decoded:?}");
    let lines = stdout(&decoded);
    assert!(lines.contains("2 VAT registration number: 399999999900003"));
    assert!(lines.contains(&format!("6 invoice hash: {invoice_hash}")));
}

#[test]
fn verify_rejects_wrong_hash() {
    let dir = tempfile::tempdir().expect("tempdir");
    let signed_path = dir.path().join("signed.xml");
    let signed_path = signed_path.to_str().expect("path");
    assert!(sign_first(signed_path).status.success());

    let verify = run(&[
        "verify",
        "--invoice",
        signed_path,
        "--hash",
        "NWZlY2ViNjZmZmM4NmYzOGQ5NTI3ODZjNmQ2OTZjNzljMmRiYzIzOWRkNGU5MWI0NjcyOWQ3M2EyN2ZiNTdlOQ==",
    ]);
    assert!(!verify.status.success());
    assert_eq!(stdout(&verify).trim(), "invalid");
}

#[test]
fn sign_rejects_key_that_does_not_match_certificate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("signed.xml");
    let invoice = fixture(&["invoices", "simplified-invoice.xml"]);
    let cert = fixture(&["certs", "signing-cert.pem"]);
    let key = fixture(&["keys", "other-key.pem"]);
    let output = run(&[
        "sign",
        "--invoice",
        invoice.to_str().expect("path"),
        "--cert",
        cert.to_str().expect("path"),
        "--key",
        key.to_str().expect("path"),
        "--first",
        "--output",
        out.to_str().expect("path"),
    ]);
    assert!(!output.status.success());
    assert!(!out.exists());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not match"), "{stderr}");
}

#[test]
fn sign_requires_predecessor_or_first() {
    let invoice = fixture(&["invoices", "simplified-invoice.xml"]);
    let cert = fixture(&["certs", "signing-cert.pem"]);
    let key = fixture(&["keys", "signing-key.pem"]);
    let output = run(&[
        "sign",
        "--invoice",
        invoice.to_str().expect("path"),
        "--cert",
        cert.to_str().expect("path"),
        "--key",
        key.to_str().expect("path"),
    ]);
    assert!(!output.status.success());
}

#[test]
fn qr_command_rejects_malformed_payload() {
    let output = run(&["qr", "--payload", "AQ=="]);
    assert!(!output.status.success());
}
