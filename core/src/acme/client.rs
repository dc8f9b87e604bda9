/*
 * client.rs
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

//! The ACME request pipeline. Every operation resolves the directory
//! and a Replay-Nonce on demand, signs its POST, and retries exactly the
//! badNonce rejection locally; everything else surfaces to the caller.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::codec::base64url::bin2b64url;
use crate::error::{Context as _, Error, Result};
use crate::json::JsonWriter;
use crate::jws::{acme_jwk_jws, acme_jws, eab_jws, Key};
use crate::protocol::http::{HttpClient, HttpRequest, HttpResponse, Method, Pair};
use crate::web::link::{find_rel, parse_link_header};
use crate::web::retry::parse_retry_after;
use crate::web::url::Url;

use super::AcmeAccount;

const BAD_NONCE_TYPE: &str = "urn:ietf:params:acme:error:badNonce";

/// ZeroSSL-style external account binding credentials.
pub struct EabCredentials {
    pub kid: String,
    pub hmac_key: Vec<u8>,
}

#[derive(Debug)]
pub struct NewOrder {
    pub order: String,
    pub expires: String,
    pub authorization: String,
    pub finalize: String,
}

#[derive(Debug)]
pub struct OrderInfo {
    pub domain: String,
    pub status: String,
    pub expires: String,
    pub authorization: String,
    pub finalize: String,
    pub certificate: Option<String>,
    /// Absolute unix time from a Retry-After header, when present.
    pub retry_after: Option<i64>,
}

#[derive(Debug)]
pub struct AuthzInfo {
    pub domain: String,
    pub status: String,
    pub expires: String,
    /// The dns-01 challenge url and token, when the authz offers one.
    pub challenge: Option<String>,
    pub token: Option<String>,
}

#[derive(Deserialize)]
struct DirectoryMeta {
    #[serde(rename = "termsOfService")]
    terms_of_service: String,
}

#[derive(Deserialize)]
struct Directory {
    #[serde(rename = "keyChange")]
    key_change: String,
    meta: DirectoryMeta,
    #[serde(rename = "newAccount")]
    new_account: String,
    #[serde(rename = "newNonce")]
    new_nonce: String,
    #[serde(rename = "newOrder")]
    new_order: String,
    #[serde(rename = "revokeCert")]
    revoke_cert: String,
}

#[derive(Deserialize)]
struct Identifier {
    #[serde(rename = "type")]
    typ: String,
    value: String,
}

#[derive(Deserialize)]
struct OrderBody {
    authorizations: Vec<String>,
    expires: String,
    finalize: String,
    identifiers: Vec<Identifier>,
    status: String,
    certificate: Option<String>,
}

#[derive(Deserialize)]
struct ChallengeBody {
    #[allow(dead_code)]
    status: String,
    token: Option<String>,
    #[serde(rename = "type")]
    typ: String,
    url: String,
}

#[derive(Deserialize)]
struct AuthzBody {
    challenges: Vec<ChallengeBody>,
    expires: String,
    identifier: Identifier,
    status: String,
}

#[derive(Deserialize)]
struct OrdersBody {
    orders: Vec<String>,
}

#[derive(Deserialize)]
struct NewAccountBody {
    orders: String,
    status: String,
}

#[derive(Deserialize)]
struct ProblemBody {
    #[serde(rename = "type")]
    typ: String,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn jose_headers() -> Vec<Pair> {
    vec![Pair::new("Content-Type", "application/jose+json")]
}

fn is_bad_nonce(resp: &HttpResponse) -> bool {
    if resp.status != 400 {
        return false;
    }
    match serde_json::from_slice::<ProblemBody>(&resp.body) {
        Ok(problem) => problem.typ == BAD_NONCE_TYPE,
        Err(_) => false,
    }
}

fn expect_status(resp: &HttpResponse, exp: u16, doingwhat: &str) -> Result<()> {
    if resp.status == exp {
        return Ok(());
    }
    Err(Error::response(format!(
        "non-{} response {}: {} {:?}\n---\n{}\n---",
        exp,
        doingwhat,
        resp.status,
        resp.reason,
        String::from_utf8_lossy(&resp.body),
    )))
}

fn parse_body<'a, T: Deserialize<'a>>(resp: &'a HttpResponse, doingwhat: &str) -> Result<T> {
    serde_json::from_slice(&resp.body).map_err(|e| {
        Error::response(format!(
            "invalid body {}: {}\n---\n{}\n---",
            doingwhat,
            e,
            String::from_utf8_lossy(&resp.body),
        ))
    })
}

/// One ACME context over one HTTP client. Holds at most one operation at
/// a time (&mut self); overlapping operations need separate contexts.
pub struct AcmeClient {
    http: HttpClient,
    directory_url: String,
    dir: Option<Directory>,
    nonce: Option<String>,
}

impl AcmeClient {
    pub fn new(http: HttpClient, directory: impl Into<String>) -> Self {
        Self {
            http,
            directory_url: directory.into(),
            dir: None,
            nonce: None,
        }
    }

    fn cache_nonce(&mut self, resp: &HttpResponse) {
        if let Some(nonce) = resp.header("Replay-Nonce") {
            self.nonce = Some(nonce.to_string());
        }
    }

    async fn need_directory(&mut self) -> Result<()> {
        if self.dir.is_some() {
            return Ok(());
        }
        let url = Url::parse(&self.directory_url)?;
        let resp = self
            .http
            .request(HttpRequest::new(Method::Get, &url))
            .await
            .ctx("fetching directory urls")?;
        expect_status(&resp, 200, "fetching directory urls")?;
        let dir: Directory = parse_body(&resp, "fetching directory urls")?;
        // all directory urls must at least parse
        for text in [
            &dir.new_nonce,
            &dir.new_account,
            &dir.new_order,
            &dir.revoke_cert,
            &dir.key_change,
            &dir.meta.terms_of_service,
        ] {
            Url::parse(text).ctx("validating directory urls")?;
        }
        self.dir = Some(dir);
        Ok(())
    }

    fn dir(&self) -> Result<&Directory> {
        self.dir
            .as_ref()
            .ok_or_else(|| Error::internal("directory used before fetch"))
    }

    async fn need_nonce(&mut self) -> Result<()> {
        if self.nonce.is_some() {
            return Ok(());
        }
        self.need_directory().await?;
        let url = Url::parse(&self.dir()?.new_nonce)?;
        let resp = self
            .http
            .request(HttpRequest::new(Method::Head, &url))
            .await
            .ctx("fetching new nonce")?;
        self.cache_nonce(&resp);
        expect_status(&resp, 200, "fetching new nonce")?;
        if self.nonce.is_none() {
            return Err(Error::response("did not see Replay-Nonce header"));
        }
        Ok(())
    }

    /// Signed POST with the badNonce retry loop: on a 400 with the
    /// badNonce problem type, drop the nonce, re-sign, and resend.
    async fn signed_post<F>(&mut self, url: &str, body: F, doingwhat: &str) -> Result<HttpResponse>
    where
        F: Fn(&str) -> Result<String>,
    {
        loop {
            self.need_directory().await?;
            self.need_nonce().await?;
            let nonce = self
                .nonce
                .take()
                .ok_or_else(|| Error::internal("nonce vanished"))?;
            let jws = body(&nonce)?;
            let parsed = Url::parse(url)?;
            let headers = jose_headers();
            let resp = self
                .http
                .request(HttpRequest {
                    method: Method::Post,
                    url: &parsed,
                    params: &[],
                    headers: &headers,
                    body: jws.as_bytes(),
                })
                .await
                .ctx(doingwhat)?;
            self.cache_nonce(&resp);
            if is_bad_nonce(&resp) {
                log::debug!("badNonce while {}; retrying with a fresh nonce", doingwhat);
                self.nonce = None;
                continue;
            }
            return Ok(resp);
        }
    }

    /// POST newAccount. Takes ownership of the key; it lands in the
    /// returned account.
    pub async fn new_account(
        &mut self,
        key: Key,
        contact_email: &str,
        eab: Option<&EabCredentials>,
    ) -> Result<AcmeAccount> {
        let doingwhat = "posting new account";
        self.need_directory().await?;
        let url = self.dir()?.new_account.clone();

        let eab_body = match eab {
            Some(creds) => Some(eab_jws(&creds.hmac_key, &creds.kid, &url, &key)?),
            None => None,
        };
        let mut payload = JsonWriter::new();
        payload.write_start_object();
        payload.write_key("contact");
        payload.write_start_array();
        payload.write_string(&format!("mailto:{}", contact_email));
        payload.write_end_array();
        payload.write_key("termsOfServiceAgreed");
        payload.write_bool(true);
        if let Some(eab_body) = &eab_body {
            payload.write_key("externalAccountBinding");
            payload.write_raw(eab_body);
        }
        payload.write_end_object();
        let payload = payload.into_string();

        let resp = self
            .signed_post(
                &url,
                |nonce| acme_jwk_jws(&key, payload.as_bytes(), nonce, &url),
                doingwhat,
            )
            .await?;
        expect_status(&resp, 201, doingwhat)?;

        let body: NewAccountBody = parse_body(&resp, doingwhat)?;
        if body.status != "valid" {
            return Err(Error::response(format!(
                "new account .status != valid (status = {:?})",
                body.status
            )));
        }
        let kid = resp
            .header("Location")
            .ok_or_else(|| Error::response("did not see Location header"))?
            .to_string();

        Ok(AcmeAccount {
            key,
            kid,
            orders: body.orders,
        })
    }

    /// POST newOrder for a single dns identifier.
    pub async fn new_order(&mut self, acct: &AcmeAccount, domain: &str) -> Result<NewOrder> {
        let doingwhat = "posting new order";
        self.need_directory().await?;
        let url = self.dir()?.new_order.clone();

        let mut payload = JsonWriter::new();
        payload.write_start_object();
        payload.write_key("identifiers");
        payload.write_start_array();
        payload.write_start_object();
        payload.write_key("type");
        payload.write_string("dns");
        payload.write_key("value");
        payload.write_string(domain);
        payload.write_end_object();
        payload.write_end_array();
        payload.write_end_object();
        let payload = payload.into_string();

        let resp = self
            .signed_post(
                &url,
                |nonce| acme_jws(&acct.key, payload.as_bytes(), nonce, &url, &acct.kid),
                doingwhat,
            )
            .await?;
        expect_status(&resp, 201, doingwhat)?;

        let body: OrderBody = parse_body(&resp, doingwhat)?;
        let authorization = single_authorization(&body, doingwhat)?;
        check_identifiers(&body, domain, doingwhat)?;
        if body.status != "pending" {
            return Err(Error::response(format!(
                "new order .status != pending (status = {:?})",
                body.status
            )));
        }
        let order = resp
            .header("Location")
            .ok_or_else(|| Error::response("did not see Location header"))?
            .to_string();

        Ok(NewOrder {
            order,
            expires: body.expires,
            authorization,
            finalize: body.finalize,
        })
    }

    /// POST-as-GET an order url.
    pub async fn get_order(&mut self, acct: &AcmeAccount, order_url: &str) -> Result<OrderInfo> {
        let doingwhat = "getting order";
        let resp = self
            .signed_post(
                order_url,
                |nonce| acme_jws(&acct.key, b"", nonce, order_url, &acct.kid),
                doingwhat,
            )
            .await?;
        expect_status(&resp, 200, doingwhat)?;

        let retry_after = match resp.header("Retry-After") {
            Some(text) => Some(parse_retry_after(text, now_unix()).ctx(doingwhat)?),
            None => None,
        };
        let body: OrderBody = parse_body(&resp, doingwhat)?;
        let authorization = single_authorization(&body, doingwhat)?;
        let domain = body
            .identifiers
            .first()
            .filter(|i| i.typ == "dns")
            .map(|i| i.value.clone())
            .ok_or_else(|| Error::response("order has no dns identifier"))?;

        Ok(OrderInfo {
            domain,
            status: body.status,
            expires: body.expires,
            authorization,
            finalize: body.finalize,
            certificate: body.certificate,
            retry_after,
        })
    }

    /// POST-as-GET the account's orders url, following rel="next" pages.
    pub async fn list_orders(&mut self, acct: &AcmeAccount) -> Result<Vec<String>> {
        let doingwhat = "listing orders";
        let mut orders = Vec::new();
        let mut current = acct.orders.clone();
        loop {
            let url = current.clone();
            let resp = self
                .signed_post(
                    &url,
                    |nonce| acme_jws(&acct.key, b"", nonce, &url, &acct.kid),
                    doingwhat,
                )
                .await?;
            expect_status(&resp, 200, doingwhat)?;

            let body: OrdersBody = parse_body(&resp, doingwhat)?;
            orders.extend(body.orders);

            // follow rel=next links until they run out
            let mut next = None;
            for header in resp.headers.iter().filter(|p| {
                p.key.eq_ignore_ascii_case("Link")
            }) {
                let links = parse_link_header(&header.value).ctx(doingwhat)?;
                if let Some(url) = find_rel(&links, "next") {
                    next = Some(url.to_string());
                    break;
                }
            }
            match next {
                Some(n) => current = n,
                None => break,
            }
        }
        Ok(orders)
    }

    /// POST-as-GET an authorization url.
    pub async fn get_authz(&mut self, acct: &AcmeAccount, authz_url: &str) -> Result<AuthzInfo> {
        let doingwhat = "getting authorization";
        let resp = self
            .signed_post(
                authz_url,
                |nonce| acme_jws(&acct.key, b"", nonce, authz_url, &acct.kid),
                doingwhat,
            )
            .await?;
        expect_status(&resp, 200, doingwhat)?;

        let body: AuthzBody = parse_body(&resp, doingwhat)?;
        if body.identifier.typ != "dns" {
            return Err(Error::response("authorization is not for a dns identifier"));
        }
        let mut challenge = None;
        let mut token = None;
        for c in &body.challenges {
            if c.typ != "dns-01" {
                continue;
            }
            let t = c
                .token
                .as_ref()
                .ok_or_else(|| Error::response("type=dns-01 challenge has no token"))?;
            challenge = Some(c.url.clone());
            token = Some(t.clone());
        }

        Ok(AuthzInfo {
            domain: body.identifier.value,
            status: body.status,
            expires: body.expires,
            challenge,
            token,
        })
    }

    /// POST `{}` to a challenge url; the body has nothing useful in it.
    pub async fn challenge(&mut self, acct: &AcmeAccount, challenge_url: &str) -> Result<()> {
        let doingwhat = "responding to challenge";
        let resp = self
            .signed_post(
                challenge_url,
                |nonce| acme_jws(&acct.key, b"{}", nonce, challenge_url, &acct.kid),
                doingwhat,
            )
            .await?;
        expect_status(&resp, 200, doingwhat)?;
        Ok(())
    }

    /// Finalize an order: submit the CSR unless finalization is already
    /// in flight, poll the order until it settles, then fetch the
    /// certificate.
    pub async fn finalize(
        &mut self,
        acct: &AcmeAccount,
        order_url: &str,
        csr_der: &[u8],
    ) -> Result<String> {
        let doingwhat = "finalizing order";
        let order = self.get_order(acct, order_url).await?;

        let in_progress = order.status == "processing" || order.status == "valid";
        if !in_progress {
            let mut payload = JsonWriter::new();
            payload.write_start_object();
            payload.write_key("csr");
            payload.write_string(&bin2b64url(csr_der));
            payload.write_end_object();
            let payload = payload.into_string();
            let finalize_url = order.finalize.clone();
            let resp = self
                .signed_post(
                    &finalize_url,
                    |nonce| acme_jws(&acct.key, payload.as_bytes(), nonce, &finalize_url, &acct.kid),
                    doingwhat,
                )
                .await?;
            expect_status(&resp, 200, doingwhat)?;
        }

        // poll until the order settles
        let order = loop {
            let order = self.get_order(acct, order_url).await?;
            match order.status.as_str() {
                "valid" => break order,
                "invalid" => {
                    return Err(Error::response("order became invalid during finalization"))
                }
                _ => {
                    let delay = order
                        .retry_after
                        .map(|at| (at - now_unix()).clamp(0, 60) as u64)
                        .unwrap_or(1);
                    log::debug!("order {:?}; polling again in {}s", order.status, delay);
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
            }
        };

        let cert_url = order
            .certificate
            .ok_or_else(|| Error::response("valid order carries no certificate url"))?;
        let resp = self
            .signed_post(
                &cert_url,
                |nonce| acme_jws(&acct.key, b"", nonce, &cert_url, &acct.kid),
                "fetching certificate",
            )
            .await?;
        expect_status(&resp, 200, "fetching certificate")?;
        String::from_utf8(resp.body)
            .map_err(|_| Error::response("certificate body is not valid utf8"))
    }
}

fn single_authorization(body: &OrderBody, doingwhat: &str) -> Result<String> {
    match body.authorizations.as_slice() {
        [one] => Ok(one.clone()),
        other => Err(Error::response(format!(
            "expected exactly one authorization {}, got {}",
            doingwhat,
            other.len()
        ))),
    }
}

fn check_identifiers(body: &OrderBody, domain: &str, doingwhat: &str) -> Result<()> {
    match body.identifiers.as_slice() {
        [one] if one.typ == "dns" && one.value == domain => Ok(()),
        _ => Err(Error::response(format!(
            "server echoed wrong identifiers {}",
            doingwhat
        ))),
    }
}
