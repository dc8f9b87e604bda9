/*
 * lib.rs
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

//! Shared plumbing for the command line tools: the common ACME flags,
//! logging to stderr, and the error-trace exit path.

use std::path::PathBuf;

use sigillo_core::acme::{AcmeClient, LETSENCRYPT, PEBBLE_DIRECTORY};
use sigillo_core::net;
use sigillo_core::protocol::http::{HttpClient, HttpClientConfig};
use sigillo_core::Result;

/// Flags every ACME tool takes.
#[derive(clap::Args, Debug)]
pub struct DirOpts {
    /// Set the acme directory to URL
    #[arg(short = 'd', long = "dir", value_name = "URL")]
    pub dir: Option<String>,

    /// Include a certificate authority from PATH
    #[arg(long = "ca", value_name = "PATH")]
    pub ca: Option<PathBuf>,

    /// Trust pebble's certificate, and change the default --dir to
    /// localhost:14000
    #[arg(long = "pebble")]
    pub pebble: bool,
}

impl DirOpts {
    pub fn directory(&self) -> String {
        match &self.dir {
            Some(dir) => dir.clone(),
            None if self.pebble => PEBBLE_DIRECTORY.to_string(),
            None => LETSENCRYPT.to_string(),
        }
    }

    pub fn http_client(&self) -> Result<HttpClient> {
        let tls = net::client_config(self.ca.as_deref(), self.pebble)?;
        Ok(HttpClient::new(HttpClientConfig::new(tls)))
    }

    pub fn acme_client(&self) -> Result<AcmeClient> {
        Ok(AcmeClient::new(self.http_client()?, self.directory()))
    }
}

pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
}

/// Render the error trace on stderr and pick the exit code.
pub fn finish(result: Result<()>) -> std::process::ExitCode {
    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
