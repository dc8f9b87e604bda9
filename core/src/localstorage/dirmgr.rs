/*
 * dirmgr.rs
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

//! Directory manager: the registry of open maildirs, shared across
//! session tasks. Accessors are refcounted; a managed dir leaves the map
//! exactly when the last accessor unregisters. Folder sync reconciles
//! the filesystem against the server's LIST response, one way only:
//! local deletions are never replayed to the server.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, RwLock};

use crate::error::{Error, Result};
use crate::protocol::imap::types::{ListResp, Selectable};

use super::maildir::{self, Maildir, CTN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MgdState {
    Open,
    DeletingCtn,
}

struct ManagedDir {
    name: String,
    maildir: Maildir,
    state: Mutex<MgdState>,
    refs: Mutex<usize>,
}

pub struct DirMgr {
    root: PathBuf,
    dirs: RwLock<HashMap<String, Arc<ManagedDir>>>,
    state_mutex: Mutex<()>,
    state_cond: Condvar,
}

/// A registered handle on an open maildir; unregisters on drop.
pub struct DirAccessor {
    dm: Arc<DirMgr>,
    mgd: Arc<ManagedDir>,
}

impl DirAccessor {
    pub fn name(&self) -> &str {
        &self.mgd.name
    }

    pub fn maildir(&self) -> &Maildir {
        &self.mgd.maildir
    }
}

impl Drop for DirAccessor {
    fn drop(&mut self) {
        self.dm.unregister(&self.mgd);
    }
}

impl DirMgr {
    pub fn new(root: impl AsRef<Path>) -> Result<Arc<DirMgr>> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| Error::fs(format!("creating {}: {}", root.display(), e)))?;
        Ok(Arc::new(DirMgr {
            root,
            dirs: RwLock::new(HashMap::new()),
            state_mutex: Mutex::new(()),
            state_cond: Condvar::new(),
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register an accessor on the named maildir, initializing it on
    /// disk if this is the first. Blocks while the dir is mid-cleanup,
    /// retrying once its state settles or it is gone.
    pub fn open(self: &Arc<Self>, name: &str) -> Result<DirAccessor> {
        loop {
            let mut dirs = self.dirs.write().unwrap();
            if let Some(mgd) = dirs.get(name) {
                let state = *mgd.state.lock().unwrap();
                if state != MgdState::Open {
                    // wait for a state change, then look again
                    let guard = self.state_mutex.lock().unwrap();
                    drop(dirs);
                    let _guard = self.state_cond.wait(guard).unwrap();
                    continue;
                }
                // just add an accessor to the existing dir
                *mgd.refs.lock().unwrap() += 1;
                return Ok(DirAccessor {
                    dm: self.clone(),
                    mgd: mgd.clone(),
                });
            }

            let maildir = Maildir::create(self.root.join(name))?;
            let mgd = Arc::new(ManagedDir {
                name: name.to_string(),
                maildir,
                state: Mutex::new(MgdState::Open),
                refs: Mutex::new(1),
            });
            dirs.insert(name.to_string(), mgd.clone());
            return Ok(DirAccessor {
                dm: self.clone(),
                mgd,
            });
        }
    }

    /// How many accessors the named dir currently has.
    pub fn accessor_count(&self, name: &str) -> Option<usize> {
        let dirs = self.dirs.read().unwrap();
        dirs.get(name).map(|mgd| *mgd.refs.lock().unwrap())
    }

    fn unregister(&self, mgd: &Arc<ManagedDir>) {
        let mut dirs = self.dirs.write().unwrap();
        let remaining = {
            let mut refs = mgd.refs.lock().unwrap();
            *refs -= 1;
            *refs
        };
        if remaining > 0 {
            return;
        }
        // all accessors gone: run any deferred cleanup, drop the entry,
        // and wake anyone waiting on a state change
        if *mgd.state.lock().unwrap() == MgdState::DeletingCtn {
            if let Err(e) = maildir::delete_ctn(mgd.maildir.path()) {
                log::warn!("deferred ctn deletion for {}: {}", mgd.name, e);
            }
        }
        dirs.remove(&mgd.name);
        let _guard = self.state_mutex.lock().unwrap();
        self.state_cond.notify_all();
    }

    /// Reconcile local storage against the LIST response tree, keyed by
    /// mailbox name.
    pub fn sync_folders(&self, tree: &BTreeMap<String, ListResp>) -> Result<()> {
        let dirs = self.dirs.write().unwrap();

        // part I: check server response and create missing dirs
        for (name, resp) in tree {
            if let Some(mgd) = dirs.get(name) {
                if resp.mflags.selectable == Selectable::NoSelect {
                    schedule_delete_ctn(mgd);
                }
                // the dir is live; don't go to the filesystem
                continue;
            }
            let dir_path = self.root.join(name);
            fs::create_dir_all(&dir_path)
                .map_err(|e| Error::fs(format!("creating {}: {}", dir_path.display(), e)))?;
            if resp.mflags.selectable != Selectable::NoSelect {
                maildir::make_ctn(&dir_path)?;
            }
        }

        // part II: check the filesystem and delete unneeded directories
        delete_extra_dirs(&dirs, tree, &self.root, "")?;
        Ok(())
    }
}

fn schedule_delete_ctn(mgd: &Arc<ManagedDir>) {
    let mut state = mgd.state.lock().unwrap();
    if *state == MgdState::Open {
        // the final unregister executes the deletion
        *state = MgdState::DeletingCtn;
    }
}

/// Recursive filesystem walk under the maildir root. Returns whether any
/// child of `full` survived, so a container is retained when it still
/// holds live children.
fn delete_extra_dirs(
    dirs: &HashMap<String, Arc<ManagedDir>>,
    tree: &BTreeMap<String, ListResp>,
    full: &Path,
    rel: &str,
) -> Result<bool> {
    let mut have_children = false;
    let entries = fs::read_dir(full)
        .map_err(|e| Error::fs(format!("listing {}: {}", full.display(), e)))?;
    for entry in entries {
        let entry =
            entry.map_err(|e| Error::fs(format!("listing {}: {}", full.display(), e)))?;
        let file_type = entry
            .file_type()
            .map_err(|e| Error::fs(format!("stat {}: {}", full.display(), e)))?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if CTN.contains(&name.as_str()) {
            continue;
        }
        let child_rel = if rel.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", rel, name)
        };
        let child_full = full.join(&name);
        let child_have = delete_extra_dirs(dirs, tree, &child_full, &child_rel)?;

        let remote = tree.contains_key(&child_rel);
        if remote {
            have_children = true;
        } else if let Some(mgd) = dirs.get(&child_rel) {
            // gone from the server but still open locally: retain the
            // directory, schedule the ctn deletion
            schedule_delete_ctn(mgd);
            have_children = true;
        } else if child_have {
            // folder not on the server, but its children survive
            maildir::delete_ctn(&child_full)?;
            have_children = true;
        } else {
            maildir::remove_all(&child_full)?;
        }
    }
    Ok(have_children)
}
