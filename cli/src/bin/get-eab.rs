/*
 * get-eab.rs
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

//! get-eab: fetch externalAccountBinding credentials from zerossl.

use clap::Parser;
use serde::Deserialize;
use sigillo_cli::{finish, init_logging};
use sigillo_core::codec::base64url::b64url2bin;
use sigillo_core::json::JsonWriter;
use sigillo_core::net;
use sigillo_core::protocol::http::{
    HttpClient, HttpClientConfig, HttpRequest, Method, Pair,
};
use sigillo_core::web::url::Url;
use sigillo_core::{Error, Result};

const EAB_URL: &str = "https://api.zerossl.com/acme/eab-credentials";

/// usage: get-eab ACCESS_KEY > eab
#[derive(Parser, Debug)]
#[command(name = "get-eab")]
struct Args {
    /// ZeroSSL API access key
    access_key: String,
}

#[derive(Deserialize)]
struct EabBody {
    success: bool,
    eab_kid: String,
    eab_hmac_key: String,
}

async fn run(args: Args) -> Result<()> {
    let tls = net::client_config(None, false)?;
    let mut http = HttpClient::new(HttpClientConfig::new(tls));

    let url = Url::parse(EAB_URL)?;
    let params = [Pair::new("access_key", args.access_key)];
    let resp = http
        .request(HttpRequest {
            method: Method::Post,
            url: &url,
            params: &params,
            headers: &[],
            body: &[],
        })
        .await?;
    if resp.status != 200 {
        return Err(Error::response(format!(
            "non-200 status code: {} {:?}",
            resp.status, resp.reason
        )));
    }

    let body: EabBody = serde_json::from_slice(&resp.body)
        .map_err(|e| Error::response(format!("invalid eab response: {}", e)))?;
    if !body.success {
        return Err(Error::response("response.success != true"));
    }
    // the key must be base64url-encoded
    b64url2bin(&body.eab_hmac_key)
        .map_err(|e| e.context("hmac key failed base64url decoding"))?;

    let mut w = JsonWriter::new();
    w.write_start_object();
    w.write_key("eab_kid");
    w.write_string(&body.eab_kid);
    w.write_key("eab_hmac_key");
    w.write_string(&body.eab_hmac_key);
    w.write_end_object();
    println!("{}", w.into_string());
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_logging();
    let args = Args::parse();
    finish(run(args).await)
}
