/*
 * finalize.rs
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

//! finalize: generate a certificate key, submit the CSR, poll the order
//! until it settles, and print the certificate chain.

use std::path::PathBuf;

use clap::Parser;
use sigillo_cli::{finish, init_logging, DirOpts};
use sigillo_core::acme::AcmeAccount;
use sigillo_core::{Error, Result};

/// usage: finalize [OPTIONS] ACCOUNT.JSON ORDER KEYOUT > cert.pem
#[derive(Parser, Debug)]
#[command(name = "finalize")]
struct Args {
    #[command(flatten)]
    opts: DirOpts,

    /// Account file from new-account
    account: PathBuf,

    /// Order url from new-order
    order: String,

    /// Where to write the new certificate key (PEM)
    keyout: PathBuf,
}

async fn run(args: Args) -> Result<()> {
    let acct = AcmeAccount::from_file(&args.account)?;
    let mut acme = args.opts.acme_client()?;

    // the CSR needs the domain; the order knows it
    let order = acme.get_order(&acct, &args.order).await?;

    // write a new certificate key, then build the CSR with it
    let key_pair = rcgen::KeyPair::generate()
        .map_err(|e| Error::crypto(format!("certificate key generation failed: {}", e)))?;
    std::fs::write(&args.keyout, key_pair.serialize_pem())
        .map_err(|e| Error::fs(format!("writing {}: {}", args.keyout.display(), e)))?;

    let params = rcgen::CertificateParams::new(vec![order.domain.clone()])
        .map_err(|e| Error::param(format!("bad certificate params: {}", e)))?;
    let csr = params
        .serialize_request(&key_pair)
        .map_err(|e| Error::crypto(format!("building csr failed: {}", e)))?;

    let cert = acme.finalize(&acct, &args.order, csr.der()).await?;
    print!("{}", cert);
    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_logging();
    let args = Args::parse();
    finish(run(args).await)
}
