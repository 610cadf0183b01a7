/*
 * This file is part of hddsaver.
 *
 * Copyright (C) 2025 hddsaver contributors
 *
 * hddsaver is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hddsaver is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hddsaver. If not, see <https://www.gnu.org/licenses/>.
 */

//! Board identification and the HDD Saver allow-list.

use std::fs;
use std::path::Path;

use crate::constants::boards;

/// DMI board vendor and name as reported by firmware
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardIdentity {
    pub vendor: Option<String>,
    pub name: Option<String>,
}

impl BoardIdentity {
    pub fn new(vendor: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vendor: Some(vendor.into()),
            name: Some(name.into()),
        }
    }

    /// Reads `board_vendor` and `board_name` from a DMI sysfs directory
    pub fn from_dmi_dir(dir: &Path) -> Self {
        let read_trim = |file: &str| -> Option<String> {
            fs::read_to_string(dir.join(file))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            vendor: read_trim("board_vendor"),
            name: read_trim("board_name"),
        }
    }

    /// True only for boards where GPIO10 is known to drive the HDD Saver switch.
    ///
    /// Matching is exact; near-identical model strings are not accepted.
    pub fn has_hddsaver_wiring(&self) -> bool {
        match (self.vendor.as_deref(), self.name.as_deref()) {
            (Some(vendor), Some(name)) => vendor == boards::VENDOR && boards::MODELS.contains(&name),
            _ => false,
        }
    }
}

impl std::fmt::Display for BoardIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.vendor, &self.name) {
            (Some(v), Some(n)) => write!(f, "{} {}", v, n),
            (Some(v), None) => write!(f, "{}", v),
            (None, Some(n)) => write!(f, "{}", n),
            (None, None) => write!(f, "unknown board"),
        }
    }
}
