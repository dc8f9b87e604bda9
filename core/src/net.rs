/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Sigillo, a mail and certificate infrastructure toolkit.
 *
 * Sigillo is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Sigillo is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Sigillo.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TLS client configuration: platform roots with webpki fallback, extra
//! CA files for private directories, and a pebble mode for local ACME
//! test servers.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::{Error, Result};

/// Build a root certificate store: platform native certs first, then
/// webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

fn add_ca_file(root_store: &mut RootCertStore, path: &Path) -> Result<()> {
    let pem = fs::read(path)
        .map_err(|e| Error::fs(format!("reading ca file {}: {}", path.display(), e)))?;
    let mut cursor = std::io::Cursor::new(pem);
    let mut added = 0usize;
    for cert in rustls_pemfile::certs(&mut cursor) {
        let cert =
            cert.map_err(|e| Error::param(format!("bad pem in {}: {}", path.display(), e)))?;
        root_store
            .add(cert)
            .map_err(|e| Error::param(format!("bad certificate in {}: {}", path.display(), e)))?;
        added += 1;
    }
    if added == 0 {
        return Err(Error::param(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(())
}

/// TLS client config for the HTTP client. `extra_ca` adds roots from a
/// PEM file; `trust_pebble` disables verification entirely, for talking
/// to a local pebble instance with its throwaway certificate.
pub fn client_config(extra_ca: Option<&Path>, trust_pebble: bool) -> Result<Arc<ClientConfig>> {
    if trust_pebble {
        let config = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(PebbleVerifier))
            .with_no_client_auth();
        return Ok(Arc::new(config));
    }
    let mut root_store = build_root_store();
    if let Some(path) = extra_ca {
        add_ca_file(&mut root_store, path)?;
    }
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Accepts whatever certificate the server offers. Only reachable via
/// the explicit --pebble flag.
#[derive(Debug)]
struct PebbleVerifier;

impl ServerCertVerifier for PebbleVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
        ]
    }
}
