/*
 * maildir.rs
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

//! One maildir on disk: the directory itself plus its cur/tmp/new
//! subdirectories ("ctn").

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CTN: [&str; 3] = ["cur", "tmp", "new"];

#[derive(Debug, Clone)]
pub struct Maildir {
    path: PathBuf,
}

impl Maildir {
    /// Open the maildir at `path`, creating the directory and ctn as
    /// needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Maildir> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)
            .map_err(|e| Error::fs(format!("creating {}: {}", path.display(), e)))?;
        make_ctn(&path)?;
        Ok(Maildir { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_valid(path: &Path) -> bool {
        path.is_dir() && CTN.iter().all(|sub| path.join(sub).is_dir())
    }

    /// Deliver a message straight into `new/`, via `tmp/` per the
    /// maildir contract.
    pub fn deliver(&self, filename: &str, data: &[u8]) -> Result<()> {
        let tmp = self.path.join("tmp").join(filename);
        fs::write(&tmp, data)
            .map_err(|e| Error::fs(format!("writing {}: {}", tmp.display(), e)))?;
        let new = self.path.join("new").join(filename);
        fs::rename(&tmp, &new)
            .map_err(|e| Error::fs(format!("delivering {}: {}", new.display(), e)))?;
        Ok(())
    }
}

/// Ensure cur/tmp/new exist under `path`.
pub fn make_ctn(path: &Path) -> Result<()> {
    for sub in CTN {
        let dir = path.join(sub);
        if !dir.is_dir() {
            fs::create_dir_all(&dir)
                .map_err(|e| Error::fs(format!("creating {}: {}", dir.display(), e)))?;
        }
    }
    Ok(())
}

/// Remove cur/tmp/new under `path`, leaving the directory itself.
pub fn delete_ctn(path: &Path) -> Result<()> {
    for sub in CTN {
        let dir = path.join(sub);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .map_err(|e| Error::fs(format!("removing {}: {}", dir.display(), e)))?;
        }
    }
    Ok(())
}

/// Remove a maildir and everything under it.
pub fn remove_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .map_err(|e| Error::fs(format!("removing {}: {}", path.display(), e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_validate() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("box");
        assert!(!Maildir::is_valid(&path));
        let md = Maildir::create(&path).unwrap();
        assert!(Maildir::is_valid(md.path()));
        // idempotent
        Maildir::create(&path).unwrap();
    }

    #[test]
    fn deliver_lands_in_new() {
        let tmp = tempfile::tempdir().unwrap();
        let md = Maildir::create(tmp.path().join("box")).unwrap();
        md.deliver("12345.msg", b"Subject: x\r\n\r\nhello").unwrap();
        let delivered = md.path().join("new").join("12345.msg");
        assert_eq!(std::fs::read(delivered).unwrap(), b"Subject: x\r\n\r\nhello");
        assert!(std::fs::read_dir(md.path().join("tmp")).unwrap().next().is_none());
    }

    #[test]
    fn ctn_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("box");
        Maildir::create(&path).unwrap();
        delete_ctn(&path).unwrap();
        assert!(path.is_dir());
        assert!(!Maildir::is_valid(&path));
        make_ctn(&path).unwrap();
        assert!(Maildir::is_valid(&path));
    }
}
