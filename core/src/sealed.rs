/*
 * sealed.rs
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

//! Message sealing for encrypt-msg: one ChaCha20-Poly1305 content key
//! encrypts the payload, and each recipient receives that key wrapped
//! under an ephemeral P-256 ECDH agreement (HKDF-SHA256 derived).

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize as _;

use crate::codec::base64url::{b64url2bin, bin2b64url};
use crate::error::{Error, Result};
use crate::json::JsonWriter;
use crate::jws::Key;

const WRAP_INFO: &[u8] = b"sigillo message key wrap v1";

/// A recipient's P-256 public key, with the JWK thumbprint as its
/// fingerprint.
pub struct RecipientKey {
    public: p256::PublicKey,
    fingerprint: String,
}

fn jwk_pub_for(public: &p256::PublicKey) -> String {
    let point = public.to_encoded_point(false);
    let x = point.x().map(|x| x.to_vec()).unwrap_or_default();
    let y = point.y().map(|y| y.to_vec()).unwrap_or_default();
    let mut w = JsonWriter::new();
    w.write_start_object();
    w.write_key("crv");
    w.write_string("P-256");
    w.write_key("kty");
    w.write_string("EC");
    w.write_key("x");
    w.write_string(&bin2b64url(&x));
    w.write_key("y");
    w.write_string(&bin2b64url(&y));
    w.write_end_object();
    w.into_string()
}

fn fingerprint_for(public: &p256::PublicKey) -> String {
    bin2b64url(&Sha256::digest(jwk_pub_for(public).as_bytes()))
}

impl RecipientKey {
    /// Accepts a public or private P-256 JWK; the private part is
    /// ignored.
    pub fn from_json(text: &str) -> Result<RecipientKey> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::param(format!("invalid jwk json: {}", e)))?;
        let kty = value.get("kty").and_then(|v| v.as_str()).unwrap_or("");
        let crv = value.get("crv").and_then(|v| v.as_str()).unwrap_or("");
        if kty != "EC" || crv != "P-256" {
            return Err(Error::param(
                "message encryption requires P-256 (ES256) recipient keys",
            ));
        }
        let get = |member: &str| -> Result<Vec<u8>> {
            let text = value
                .get(member)
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::param(format!("jwk missing {}", member)))?;
            b64url2bin(text)
        };
        let x = get("x")?;
        let y = get("y")?;
        if x.len() != 32 || y.len() != 32 {
            return Err(Error::param("P-256 coordinates must be 32 bytes"));
        }
        let point = p256::EncodedPoint::from_affine_coordinates(
            p256::FieldBytes::from_slice(&x),
            p256::FieldBytes::from_slice(&y),
            false,
        );
        let public = Option::<p256::PublicKey>::from(p256::PublicKey::from_encoded_point(&point))
            .ok_or_else(|| Error::param("jwk point is not on the P-256 curve"))?;
        let fingerprint = fingerprint_for(&public);
        Ok(RecipientKey {
            public,
            fingerprint,
        })
    }

    pub fn from_file(path: &std::path::Path) -> Result<RecipientKey> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::fs(format!("reading {}: {}", path.display(), e)))?;
        RecipientKey::from_json(&text)
            .map_err(|e| e.context(format!("loading recipient key {}", path.display())))
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn wrap_key_for(shared: &[u8]) -> Result<ChaCha20Poly1305> {
    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut kek = [0u8; 32];
    hk.expand(WRAP_INFO, &mut kek)
        .map_err(|e| Error::crypto(format!("hkdf expand failed: {}", e)))?;
    let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&kek));
    kek.zeroize();
    Ok(cipher)
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut out);
    out
}

/// Seal a message to every recipient. Output is a compact JSON envelope.
pub fn seal_message(recipients: &[RecipientKey], plaintext: &[u8]) -> Result<String> {
    if recipients.is_empty() {
        return Err(Error::param("no encryption keys provided"));
    }

    let mut cek = random_bytes::<32>();
    let nonce = random_bytes::<12>();
    let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&cek));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Error::crypto("message encryption failed"))?;

    let mut w = JsonWriter::new();
    w.write_start_object();
    w.write_key("version");
    w.write_u64(1);
    w.write_key("recipients");
    w.write_start_array();
    for recipient in recipients {
        let ephemeral = p256::ecdh::EphemeralSecret::random(&mut rand::rngs::OsRng);
        let epk = ephemeral.public_key();
        let shared = ephemeral.diffie_hellman(&recipient.public);
        let wrapper = wrap_key_for(shared.raw_secret_bytes().as_slice())?;
        let wrap_nonce = random_bytes::<12>();
        let wrapped = wrapper
            .encrypt(Nonce::from_slice(&wrap_nonce), &cek[..])
            .map_err(|_| Error::crypto("key wrap failed"))?;

        w.write_start_object();
        w.write_key("kid");
        w.write_string(&recipient.fingerprint);
        w.write_key("epk");
        w.write_raw(&jwk_pub_for(&epk));
        w.write_key("nonce");
        w.write_string(&bin2b64url(&wrap_nonce));
        w.write_key("wrapped_key");
        w.write_string(&bin2b64url(&wrapped));
        w.write_end_object();
    }
    w.write_end_array();
    w.write_key("nonce");
    w.write_string(&bin2b64url(&nonce));
    w.write_key("ciphertext");
    w.write_string(&bin2b64url(&ciphertext));
    w.write_end_object();

    cek.zeroize();
    Ok(w.into_string())
}

/// Open a sealed message with a recipient's ES256 private key.
pub fn open_message(key: &Key, sealed: &str) -> Result<Vec<u8>> {
    let Key::Es256(signing) = key else {
        return Err(Error::param("message decryption requires an ES256 key"));
    };
    let public = p256::PublicKey::from_secret_scalar(signing.as_nonzero_scalar());
    let fingerprint = fingerprint_for(&public);

    let value: serde_json::Value = serde_json::from_str(sealed)
        .map_err(|e| Error::param(format!("invalid sealed message: {}", e)))?;
    let recipients = value
        .get("recipients")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::param("sealed message missing recipients"))?;
    let entry = recipients
        .iter()
        .find(|r| r.get("kid").and_then(|k| k.as_str()) == Some(fingerprint.as_str()))
        .ok_or_else(|| Error::param("message is not sealed to this key"))?;

    let field = |obj: &serde_json::Value, member: &str| -> Result<Vec<u8>> {
        let text = obj
            .get(member)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::param(format!("sealed message missing {}", member)))?;
        b64url2bin(text)
    };

    let epk = entry
        .get("epk")
        .ok_or_else(|| Error::param("sealed message missing epk"))?;
    let epk = RecipientKey::from_json(&epk.to_string())?;
    let shared = p256::ecdh::diffie_hellman(
        signing.as_nonzero_scalar(),
        epk.public.as_affine(),
    );
    let wrapper = wrap_key_for(shared.raw_secret_bytes().as_slice())?;
    let wrap_nonce = field(entry, "nonce")?;
    let wrapped = field(entry, "wrapped_key")?;
    let mut cek = wrapper
        .decrypt(Nonce::from_slice(&wrap_nonce), &wrapped[..])
        .map_err(|_| Error::crypto("key unwrap failed"))?;

    let nonce = field(&value, "nonce")?;
    let ciphertext = field(&value, "ciphertext")?;
    let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&cek));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), &ciphertext[..])
        .map_err(|_| Error::crypto("message decryption failed"));
    cek.zeroize();
    plaintext
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_and_open_round_trip() {
        let k1 = Key::generate_es256();
        let k2 = Key::generate_es256();
        let r1 = RecipientKey::from_json(&k1.jwk_pvt()).unwrap();
        let r2 = RecipientKey::from_json(&k2.jwk_pvt()).unwrap();

        let sealed = seal_message(&[r1, r2], b"attack at dawn").unwrap();
        assert_eq!(open_message(&k1, &sealed).unwrap(), b"attack at dawn");
        assert_eq!(open_message(&k2, &sealed).unwrap(), b"attack at dawn");

        let outsider = Key::generate_es256();
        let e = open_message(&outsider, &sealed).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Param);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let k = Key::generate_es256();
        let r = RecipientKey::from_json(&k.jwk_pvt()).unwrap();
        let sealed = seal_message(&[r], b"payload").unwrap();
        let tampered = sealed.replace("\"ciphertext\":\"", "\"ciphertext\":\"AAAA");
        assert!(open_message(&k, &tampered).is_err());
    }

    #[test]
    fn requires_recipients_and_p256() {
        assert!(seal_message(&[], b"x").is_err());
        let ed = Key::generate_ed25519();
        assert!(RecipientKey::from_json(&ed.jwk_pvt()).is_err());
    }
}
