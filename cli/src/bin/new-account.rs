/*
 * new-account.rs
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

//! new-account: create an ACME account, print it as account json.

use clap::Parser;
use sigillo_cli::{finish, init_logging, DirOpts};
use sigillo_core::acme::EabCredentials;
use sigillo_core::codec::base64url::b64url2bin;
use sigillo_core::jws::Key;
use sigillo_core::{Error, Result};

/// usage: new-account [OPTIONS] CONTACT_EMAIL > account.json
#[derive(Parser, Debug)]
#[command(name = "new-account")]
struct Args {
    #[command(flatten)]
    opts: DirOpts,

    /// Contact email for the new account
    contact_email: String,

    /// External account binding key id (ZeroSSL-style)
    #[arg(long = "eab-kid", value_name = "KID", requires = "eab_hmac_key")]
    eab_kid: Option<String>,

    /// External account binding HMAC key, base64url
    #[arg(long = "eab-hmac-key", value_name = "KEY", requires = "eab_kid")]
    eab_hmac_key: Option<String>,
}

async fn run(args: Args) -> Result<()> {
    let mut acme = args.opts.acme_client()?;

    let eab = match (&args.eab_kid, &args.eab_hmac_key) {
        (Some(kid), Some(hmac_b64)) => Some(EabCredentials {
            kid: kid.clone(),
            hmac_key: b64url2bin(hmac_b64)
                .map_err(|e| e.context("decoding --eab-hmac-key"))?,
        }),
        _ => None,
    };

    let key = Key::generate_ed25519();
    let acct = acme
        .new_account(key, &args.contact_email, eab.as_ref())
        .await?;

    println!("{}", acct.to_json());
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_logging();
    let args = Args::parse();
    finish(run(args).await.map_err(|e: Error| e.context("creating new account")))
}
