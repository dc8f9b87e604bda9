/*
 * extension.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Sigillo.
 *
 * Sigillo is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This file is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this file.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Tri-state gates for the IMAP extensions the writer and reader honor.
//! Gating at write time makes an AST built without regard to extensions
//! fail loudly rather than silently emit invalid protocol.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    UidPlus,
    Enable,
    Condstore,
    Qresync,
}

impl Extension {
    fn unavailable_msg(self) -> &'static str {
        match self {
            Extension::UidPlus => "UIDPLUS extension for IMAP is not available",
            Extension::Enable => "ENABLE extension for IMAP is not available",
            Extension::Condstore => "CONDSTORE extension for IMAP is not available",
            Extension::Qresync => "QRESYNC extension for IMAP is not available",
        }
    }
}

/// Some extensions are auto-enabled, so Off does not mean Disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionState {
    #[default]
    Disabled,
    Off,
    On,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Extensions {
    pub uidplus: ExtensionState,
    pub enable: ExtensionState,
    pub condstore: ExtensionState,
    pub qresync: ExtensionState,
}

impl Extensions {
    fn state(&self, ext: Extension) -> ExtensionState {
        match ext {
            Extension::UidPlus => self.uidplus,
            Extension::Enable => self.enable,
            Extension::Condstore => self.condstore,
            Extension::Qresync => self.qresync,
        }
    }

    fn state_mut(&mut self, ext: Extension) -> &mut ExtensionState {
        match ext {
            Extension::UidPlus => &mut self.uidplus,
            Extension::Enable => &mut self.enable,
            Extension::Condstore => &mut self.condstore,
            Extension::Qresync => &mut self.qresync,
        }
    }

    /// Throw an error if an action requires an extension to be enabled.
    pub fn assert_on(&self, ext: Extension) -> Result<()> {
        if self.state(ext) != ExtensionState::On {
            return Err(Error::param(ext.unavailable_msg()));
        }
        Ok(())
    }

    /// Set an extension to On, or throw an error if it is disabled.
    pub fn trigger(&mut self, ext: Extension) -> Result<()> {
        let state = self.state_mut(ext);
        if *state == ExtensionState::Disabled {
            return Err(Error::param(ext.unavailable_msg()));
        }
        *state = ExtensionState::On;
        Ok(())
    }

    /// Mark an extension as advertised by the server: Disabled becomes
    /// Off, an already-On extension stays On.
    pub fn set_available(&mut self, ext: Extension) {
        let state = self.state_mut(ext);
        if *state == ExtensionState::Disabled {
            *state = ExtensionState::Off;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_on_requires_on() {
        let mut exts = Extensions::default();
        assert!(exts.assert_on(Extension::Condstore).is_err());
        exts.condstore = ExtensionState::Off;
        assert!(exts.assert_on(Extension::Condstore).is_err());
        exts.condstore = ExtensionState::On;
        assert!(exts.assert_on(Extension::Condstore).is_ok());
    }

    #[test]
    fn trigger_fails_when_disabled() {
        let mut exts = Extensions::default();
        let e = exts.trigger(Extension::Qresync).unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Param);
        exts.qresync = ExtensionState::Off;
        exts.trigger(Extension::Qresync).unwrap();
        assert_eq!(exts.qresync, ExtensionState::On);
        // idempotent once on
        exts.trigger(Extension::Qresync).unwrap();
        assert_eq!(exts.qresync, ExtensionState::On);
    }

    #[test]
    fn set_available_never_downgrades() {
        let mut exts = Extensions::default();
        exts.set_available(Extension::Enable);
        assert_eq!(exts.enable, ExtensionState::Off);
        exts.trigger(Extension::Enable).unwrap();
        exts.set_available(Extension::Enable);
        assert_eq!(exts.enable, ExtensionState::On);
    }
}
