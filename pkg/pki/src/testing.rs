//! Throwaway PKI for tests, here and in dependent crates (`test-util`).

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose};

/// Self-signed CA plus one client certificate signed by it.
/// Returns `(ca_pem, client_cert_pem, client_key_pem)`.
///
/// # Panics
///
/// When key generation or signing fails.
pub fn issue_test_material() -> (String, String, String) {
    let mut ca_params = CertificateParams::default();
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "allocator test CA");
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    let ca_key = KeyPair::generate().expect("generate CA key");
    let ca_cert = ca_params.self_signed(&ca_key).expect("self-sign CA");

    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, "allocator-client");
    params.is_ca = IsCa::NoCa;
    let client_key = KeyPair::generate().expect("generate client key");
    let client_cert = params
        .signed_by(&client_key, &ca_cert, &ca_key)
        .expect("sign client certificate");

    (ca_cert.pem(), client_cert.pem(), client_key.serialize_pem())
}
