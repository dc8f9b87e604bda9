/*
 * encrypt-msg.rs
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

//! encrypt-msg: seal stdin to every recipient key file given on the
//! command line, ciphertext to stdout.

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use sigillo_cli::{finish, init_logging};
use sigillo_core::sealed::{seal_message, RecipientKey};
use sigillo_core::{Error, Result};

/// usage: encrypt-msg KEYFILE... < plaintext > ciphertext
#[derive(Parser, Debug)]
#[command(name = "encrypt-msg")]
struct Args {
    /// Recipient key files (P-256 JWK, public or private)
    #[arg(required = true)]
    keyfiles: Vec<PathBuf>,
}

fn run(args: Args) -> Result<()> {
    let mut recipients = Vec::with_capacity(args.keyfiles.len());
    for path in &args.keyfiles {
        let key = RecipientKey::from_file(path)?;
        log::debug!("{}: {}", path.display(), key.fingerprint());
        recipients.push(key);
    }

    let mut plaintext = Vec::new();
    std::io::stdin()
        .read_to_end(&mut plaintext)
        .map_err(|e| Error::fs(format!("reading stdin: {}", e)))?;

    let sealed = seal_message(&recipients, &plaintext)?;
    println!("{}", sealed);
    Ok(())
}

fn main() -> std::process::ExitCode {
    init_logging();
    let args = Args::parse();
    finish(run(args))
}
