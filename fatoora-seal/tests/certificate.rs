mod common;

use base64ct::{Base64, Encoding};
use fatoora_seal::crypto::{CertificateError, CertificateInfo, PublicKeyAlgorithm};
use fatoora_seal::{Error, ErrorCategory};

#[test]
fn fixture_certificate_facts() {
    let certificate = common::signing_certificate();
    assert_eq!(
        certificate.serial_number(),
        "170091312018314903161618051228560180882260331038"
    );
    assert_eq!(
        certificate.digest(),
        "ZTYxMDNkYmMwMmY5MTE5ZGJhYWFmZWMxZjMxODcxOTE2ZjUzMzRmZWY3NzFlOTU2Y2ZlYjczNjI4N2MwNTBkNw=="
    );
    let issuer = certificate.issuer_name();
    assert!(issuer.starts_with("CN=TST-886431145-399999999900003"), "{issuer}");
    assert!(issuer.contains("O=Maximum Speed Tech Supply LTD"), "{issuer}");
    assert_eq!(certificate.public_key_algorithm(), PublicKeyAlgorithm::EcdsaSecp256k1);
    assert!(!certificate.signature().is_empty());
}

#[test]
fn issuer_name_keeps_escaped_commas_inside_values() {
    let certificate = CertificateInfo::from_pem(&common::read_fixture("certs/comma-issuer-cert.pem"))
        .expect("certificate");
    assert_eq!(certificate.issuer_name(), "CN=Comma Issuer, O=Foo\\, Inc, C=SA");
}

#[test]
fn every_encoding_yields_the_same_certificate() {
    let pem = common::read_fixture("certs/signing-cert.pem");
    let from_pem = CertificateInfo::from_pem(&pem).expect("pem");
    let der = from_pem.der().to_vec();
    let base64_der = from_pem.der_base64();
    let token = Base64::encode_string(base64_der.as_bytes());

    for input in [
        pem.as_bytes().to_vec(),
        der.clone(),
        base64_der.as_bytes().to_vec(),
        token.as_bytes().to_vec(),
    ] {
        let parsed = CertificateInfo::parse(&input).expect("parse");
        assert_eq!(parsed.der(), der.as_slice());
    }
    assert_eq!(
        CertificateInfo::from_binary_security_token(&token)
            .expect("token")
            .digest(),
        from_pem.digest()
    );
}

#[test]
fn public_key_der_is_a_secp256k1_spki() {
    let certificate = common::signing_certificate();
    let spki = certificate.public_key_der();
    // SEQUENCE { SEQUENCE { id-ecPublicKey, secp256k1 }, BIT STRING }
    assert_eq!(spki[0], 0x30);
    let secp256k1_oid = [0x06, 0x05, 0x2b, 0x81, 0x04, 0x00, 0x0a];
    assert!(spki.windows(secp256k1_oid.len()).any(|w| w == secp256k1_oid));
}

#[test]
fn p256_certificate_is_rejected() {
    let err = CertificateInfo::from_pem(&common::read_fixture("certs/p256-cert.pem"))
        .expect_err("p256 must be rejected");
    assert!(matches!(err, CertificateError::UnsupportedKey(_)));
    assert_eq!(Error::from(err).category(), ErrorCategory::CryptographicMaterial);
}

#[test]
fn key_mismatch_is_detected() {
    let certificate = common::signing_certificate();
    assert!(fatoora_seal::crypto::ensure_key_matches(&common::signing_key(), &certificate).is_ok());
    assert!(fatoora_seal::crypto::ensure_key_matches(&common::other_key(), &certificate).is_err());
}
