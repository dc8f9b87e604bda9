/*
 * new-order.rs
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

//! new-order: create an ACME order for one domain.

use std::path::PathBuf;

use clap::Parser;
use sigillo_cli::{finish, init_logging, DirOpts};
use sigillo_core::acme::AcmeAccount;
use sigillo_core::json::JsonWriter;
use sigillo_core::Result;

/// usage: new-order [OPTIONS] ACCOUNT.JSON DOMAIN
#[derive(Parser, Debug)]
#[command(name = "new-order")]
struct Args {
    #[command(flatten)]
    opts: DirOpts,

    /// Account file from new-account
    account: PathBuf,

    /// Domain to order a certificate for
    domain: String,
}

async fn run(args: Args) -> Result<()> {
    let acct = AcmeAccount::from_file(&args.account)?;
    let mut acme = args.opts.acme_client()?;
    let order = acme.new_order(&acct, &args.domain).await?;

    let mut w = JsonWriter::new();
    w.write_start_object();
    w.write_key("order");
    w.write_string(&order.order);
    w.write_key("expires");
    w.write_string(&order.expires);
    w.write_key("authorization");
    w.write_string(&order.authorization);
    w.write_key("finalize");
    w.write_string(&order.finalize);
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
