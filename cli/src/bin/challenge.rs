/*
 * challenge.rs
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

//! challenge: tell the server a challenge is ready to be validated.

use std::path::PathBuf;

use clap::Parser;
use sigillo_cli::{finish, init_logging, DirOpts};
use sigillo_core::acme::AcmeAccount;
use sigillo_core::Result;

/// usage: challenge [OPTIONS] ACCOUNT.JSON CHALLENGE
#[derive(Parser, Debug)]
#[command(name = "challenge")]
struct Args {
    #[command(flatten)]
    opts: DirOpts,

    /// Account file from new-account
    account: PathBuf,

    /// Challenge url from the authorization object
    challenge: String,
}

async fn run(args: Args) -> Result<()> {
    let acct = AcmeAccount::from_file(&args.account)?;
    let mut acme = args.opts.acme_client()?;
    acme.challenge(&acct, &args.challenge).await?;
    println!("ok");
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_logging();
    let args = Args::parse();
    finish(run(args).await)
}
