/*
 * mod.rs
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

//! JWS (RFC 7515, flattened JSON) and JWK (RFC 7517) for the ACME
//! client: Ed25519 and ES256 account keys, HS256 for external account
//! binding, thumbprints (RFC 7638), dns-01 key authorizations.

use hmac::{Hmac, Mac};
use p256::ecdsa::signature::Signer as _;
use p256::elliptic_curve::sec1::ToEncodedPoint as _;
use p256::pkcs8::{EncodePublicKey as _, LineEnding};
use sha2::{Digest, Sha256};
use zeroize::Zeroize as _;

use crate::codec::base64url::{b64url2bin, bin2b64url};
use crate::error::{Error, Result};
use crate::json::JsonWriter;

type HmacSha256 = Hmac<Sha256>;

/// An ACME account key: the algorithms we can put in a JWS `alg`.
pub enum Key {
    Ed25519(ed25519_dalek::SigningKey),
    Es256(p256::ecdsa::SigningKey),
}

impl Key {
    pub fn generate_ed25519() -> Key {
        Key::Ed25519(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    pub fn generate_es256() -> Key {
        Key::Es256(p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng))
    }

    pub fn ed25519_from_bytes(bytes: &[u8]) -> Result<Key> {
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::param("Ed25519 keys are 32 bytes"))?;
        Ok(Key::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)))
    }

    /// The fixed `alg` (and for EdDSA, `crv`) members of the protected
    /// header, as a raw JSON snippet.
    pub fn protected_params(&self) -> &'static str {
        match self {
            Key::Ed25519(_) => "\"alg\":\"EdDSA\",\"crv\":\"Ed25519\"",
            Key::Es256(_) => "\"alg\":\"ES256\"",
        }
    }

    /// Public JWK with members in sorted order, the canonical thumbprint
    /// input.
    pub fn jwk_pub(&self) -> String {
        self.jwk(false)
    }

    /// Private JWK (public members in sorted order, then `d`).
    pub fn jwk_pvt(&self) -> String {
        self.jwk(true)
    }

    fn jwk(&self, pvt: bool) -> String {
        let mut w = JsonWriter::new();
        w.write_start_object();
        match self {
            Key::Ed25519(k) => {
                w.write_key("crv");
                w.write_string("Ed25519");
                w.write_key("kty");
                w.write_string("OKP");
                w.write_key("x");
                w.write_string(&bin2b64url(&k.verifying_key().to_bytes()));
                if pvt {
                    let mut d = k.to_bytes();
                    w.write_key("d");
                    w.write_string(&bin2b64url(&d));
                    d.zeroize();
                }
            }
            Key::Es256(k) => {
                let point = k.verifying_key().to_encoded_point(false);
                // uncompressed points always carry both coordinates
                let x = point.x().map(|x| x.to_vec()).unwrap_or_default();
                let y = point.y().map(|y| y.to_vec()).unwrap_or_default();
                w.write_key("crv");
                w.write_string("P-256");
                w.write_key("kty");
                w.write_string("EC");
                w.write_key("x");
                w.write_string(&bin2b64url(&x));
                w.write_key("y");
                w.write_string(&bin2b64url(&y));
                if pvt {
                    let mut d = k.to_bytes().to_vec();
                    w.write_key("d");
                    w.write_string(&bin2b64url(&d));
                    d.zeroize();
                }
            }
        }
        w.write_end_object();
        w.into_string()
    }

    pub fn to_pem_pub(&self) -> Result<String> {
        let pem = match self {
            Key::Ed25519(k) => k.verifying_key().to_public_key_pem(LineEnding::LF),
            Key::Es256(k) => k.verifying_key().to_public_key_pem(LineEnding::LF),
        };
        pem.map_err(|e| Error::crypto(format!("public key PEM encoding failed: {}", e)))
    }

    /// Sign raw data. Ed25519 emits the 64 raw signature bytes; ES256
    /// runs ECDSA-SHA256 and emits the fixed-length R‖S form JWS wants.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Key::Ed25519(k) => {
                use ed25519_dalek::Signer as _;
                Ok(k.sign(data).to_bytes().to_vec())
            }
            Key::Es256(k) => {
                let sig: p256::ecdsa::Signature = k.sign(data);
                Ok(sig.to_bytes().to_vec())
            }
        }
    }

    /// SHA-256 over the sorted public JWK. Not base64url-encoded.
    pub fn thumbprint(&self) -> Vec<u8> {
        Sha256::digest(self.jwk_pub().as_bytes()).to_vec()
    }

    /// Read a key back from a JWK (the account-file `key` member).
    pub fn from_jwk(jwk: &serde_json::Value) -> Result<Key> {
        let kty = jwk
            .get("kty")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::param("jwk missing kty"))?;
        let crv = jwk
            .get("crv")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::param("jwk missing crv"))?;
        match kty {
            "OKP" => {
                if crv != "Ed25519" {
                    return Err(Error::param(format!(
                        "only Ed25519 EdDSA curve is supported; got crv {:?}",
                        crv
                    )));
                }
                jwk.get("x")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::param("Ed25519 keys require x and d parameters"))?;
                let d = jwk
                    .get("d")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::param("Ed25519 keys require x and d parameters"))?;
                let mut bin = b64url2bin(d)?;
                let key = Key::ed25519_from_bytes(&bin);
                bin.zeroize();
                key
            }
            "EC" => {
                if crv != "P-256" {
                    return Err(Error::param(format!(
                        "only P-256 ECDSA curve is supported; got crv {:?}",
                        crv
                    )));
                }
                for member in ["x", "y", "d"] {
                    if jwk.get(member).and_then(|v| v.as_str()).is_none() {
                        return Err(Error::param("ES256 keys require x, y, and d parameters"));
                    }
                }
                let d = jwk.get("d").and_then(|v| v.as_str()).unwrap_or_default();
                let mut bin = b64url2bin(d)?;
                let secret = p256::SecretKey::from_slice(&bin)
                    .map_err(|e| Error::param(format!("invalid P-256 private key: {}", e)));
                bin.zeroize();
                Ok(Key::Es256(p256::ecdsa::SigningKey::from(secret?)))
            }
            other => Err(Error::param(format!(
                "only Ed25519 and ES256 keys are supported; got kty {:?}",
                other
            ))),
        }
    }

    pub fn from_json(text: &str) -> Result<Key> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::param(format!("invalid jwk json: {}", e)))?;
        Key::from_jwk(&value)
    }
}

/// Assemble a flattened-JSON JWS: sign `b64url(protected).b64url(payload)`
/// with the supplied signer.
pub fn jws(
    protected: &[u8],
    payload: &[u8],
    sign: impl FnOnce(&[u8]) -> Result<Vec<u8>>,
) -> Result<String> {
    let protected_b64 = bin2b64url(protected);
    let payload_b64 = bin2b64url(payload);
    let signing_input = format!("{}.{}", protected_b64, payload_b64);
    let signature = sign(signing_input.as_bytes())?;
    Ok(format!(
        "{{\"protected\":\"{}\",\"payload\":\"{}\",\"signature\":\"{}\"}}",
        protected_b64,
        payload_b64,
        bin2b64url(&signature),
    ))
}

/// JWS with the ACME protected headers for an existing account (kid).
pub fn acme_jws(
    key: &Key,
    payload: &[u8],
    nonce: &str,
    url: &str,
    kid: &str,
) -> Result<String> {
    let mut w = JsonWriter::new();
    w.write_start_object();
    w.write_raw(key.protected_params());
    w.write_key("nonce");
    w.write_string(nonce);
    w.write_key("kid");
    w.write_string(kid);
    w.write_key("url");
    w.write_string(url);
    w.write_end_object();
    let protected = w.into_string();
    jws(protected.as_bytes(), payload, |data| key.sign(data))
}

/// JWS with the ACME protected headers for account creation, where the
/// public JWK itself identifies the signer.
pub fn acme_jwk_jws(key: &Key, payload: &[u8], nonce: &str, url: &str) -> Result<String> {
    let mut w = JsonWriter::new();
    w.write_start_object();
    w.write_raw(key.protected_params());
    w.write_key("nonce");
    w.write_string(nonce);
    w.write_key("jwk");
    w.write_raw(&key.jwk_pub());
    w.write_key("url");
    w.write_string(url);
    w.write_end_object();
    let protected = w.into_string();
    jws(protected.as_bytes(), payload, |data| key.sign(data))
}

/// HMAC-SHA256 signature over `data` with a caller-supplied symmetric key.
pub fn sign_hs256(hmac_key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(hmac_key)
        .map_err(|e| Error::crypto(format!("hmac key rejected: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// The ZeroSSL external account binding: an HS256 JWS over the account's
/// public JWK, nested inside the newAccount payload.
pub fn eab_jws(
    hmac_key: &[u8],
    eab_kid: &str,
    new_account_url: &str,
    account_key: &Key,
) -> Result<String> {
    let mut w = JsonWriter::new();
    w.write_start_object();
    w.write_raw("\"alg\":\"HS256\"");
    w.write_key("kid");
    w.write_string(eab_kid);
    w.write_key("url");
    w.write_string(new_account_url);
    w.write_end_object();
    let protected = w.into_string();
    jws(protected.as_bytes(), account_key.jwk_pub().as_bytes(), |data| {
        sign_hs256(hmac_key, data)
    })
}

/// dns-01 key authorization:
/// `b64url(SHA256(token "." b64url(thumbprint(key))))`.
pub fn dns01_key_authorization(token: &str, key: &Key) -> String {
    let thumb_b64 = bin2b64url(&key.thumbprint());
    let prehash = format!("{}.{}", token, thumb_b64);
    bin2b64url(&Sha256::digest(prehash.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8037 appendix test key
    const ED25519_PVT: [u8; 32] = [
        0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec,
        0x2c, 0xc4, 0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03,
        0x1c, 0xae, 0x7f, 0x60,
    ];

    const ACME_EXP: &str = "{\"protected\":\"eyJhbGciOiJFZERTQSIsImNydiI6IkVkMjU1MTkiLCJub25jZSI6\
Inh5eiIsImtpZCI6Imh0dHBzOi8va2lkLmNvbSIsInVybCI6Imh0dHBzOi8vdXJsLmNvbSJ9\",\"payload\":\
\"c29tZS1zcGVjaWFsLXRleHQ\",\"signature\":\"Acc54mE0ULBUjF6ZuDZD0fy2n6A1GM8Vot1HnUNbUI8ObSDEV\
GxCL9u4f8N9ylJM4hEl9uXk7lhE5URM_8m5Cg\"}";

    #[test]
    fn ed25519_acme_jws_vector() {
        let k = Key::ed25519_from_bytes(&ED25519_PVT).unwrap();
        let out = acme_jws(
            &k,
            b"some-special-text",
            "xyz",
            "https://url.com",
            "https://kid.com",
        )
        .unwrap();
        assert_eq!(out, ACME_EXP);
    }

    #[test]
    fn ed25519_plain_jws_vector() {
        let k = Key::ed25519_from_bytes(&ED25519_PVT).unwrap();
        let protected = concat!(
            "{\"alg\":\"EdDSA\",\"crv\":\"Ed25519\",\"nonce\":\"xyz\",",
            "\"kid\":\"https://kid.com\",\"url\":\"https://url.com\"}"
        );
        let out = jws(protected.as_bytes(), b"some-special-text", |d| k.sign(d)).unwrap();
        assert_eq!(out, ACME_EXP);
    }

    #[test]
    fn hs256_vector() {
        let protected = "{\"alg\":\"HS256\",\"kid\":\"mykey\",\"url\":\"https://url.com\"}";
        let out = jws(protected.as_bytes(), b"some-special-text", |d| {
            sign_hs256(b"topsecret", d)
        })
        .unwrap();
        assert!(out.ends_with(
            "\"signature\":\"zktRfmRfvlKhX7KnI-Z-GVevVEsRRbWRZ4gHB8BsUpE\"}"
        ));
    }

    #[test]
    fn ed25519_jwk_round_trip() {
        let k = Key::ed25519_from_bytes(&ED25519_PVT).unwrap();
        let pvt = k.jwk_pvt();
        assert!(pvt.starts_with("{\"crv\":\"Ed25519\",\"kty\":\"OKP\",\"x\":\""));
        let k2 = Key::from_json(&pvt).unwrap();
        assert_eq!(k.jwk_pub(), k2.jwk_pub());
        // RFC 8037 public key
        assert!(k.jwk_pub().contains("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"));
    }

    #[test]
    fn es256_jwk_round_trip() {
        let jwk_in = "{\"crv\":\"P-256\",\"kty\":\"EC\",\"x\":\"Du7BdPtQQ-YlB11mbByZfK4\
sYjsDbhLk3UlNjvvSh9A\",\"y\":\"Ls9gVIVSuUKzXqPSbtptyPBlniKJU2bBFLtmbud8R20\",\"d\":\"O_N4\
PS5BXM-PTR-ij1ZDDoButfzR4Ku-SOu-xNCx83s\"}";
        let k = Key::from_json(jwk_in).unwrap();
        assert_eq!(k.jwk_pvt(), jwk_in);
    }

    #[test]
    fn es256_signature_form() {
        use p256::ecdsa::signature::Verifier as _;
        let k = Key::generate_es256();
        let sig = k.sign(b"some-special-text").unwrap();
        // (i) exactly 32 bytes of R and 32 of S
        assert_eq!(sig.len(), 64);
        // (ii) verifies under the public key when re-encoded as DER
        let Key::Es256(signing) = &k else {
            unreachable!()
        };
        let parsed = p256::ecdsa::Signature::from_slice(&sig).unwrap();
        let der = parsed.to_der();
        assert!(der.as_bytes().len() <= 72);
        signing
            .verifying_key()
            .verify(b"some-special-text", &parsed)
            .unwrap();
    }

    #[test]
    fn thumbprint_and_dns01() {
        let k = Key::ed25519_from_bytes(&ED25519_PVT).unwrap();
        let thumb = k.thumbprint();
        assert_eq!(thumb.len(), 32);
        let authz = dns01_key_authorization("token123", &k);
        // b64url of a sha256 is always 43 chars, no padding
        assert_eq!(authz.len(), 43);
        assert!(!authz.contains('='));
    }

    #[test]
    fn eab_is_valid_flattened_jws() {
        let k = Key::ed25519_from_bytes(&ED25519_PVT).unwrap();
        let out = eab_jws(b"secret", "kid123", "https://ca/newAccount", &k).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        for member in ["protected", "payload", "signature"] {
            assert!(v.get(member).and_then(|m| m.as_str()).is_some());
        }
        // payload is the b64url public jwk
        let payload = v["payload"].as_str().unwrap();
        let decoded = crate::codec::base64url::b64url2bin(payload).unwrap();
        assert_eq!(decoded, k.jwk_pub().as_bytes());
    }
}
