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

//! The `enable` control attribute.
//!
//! Reads render `On` or `Off`; writes take a kernel-style boolean token and
//! report the number of bytes consumed.

use tracing::info;

use hs_error::{HddSaverError, Result};

use crate::device::{on_off, Device};

/// Attribute name as exposed to users
pub const ATTR_NAME: &str = "enable";

/// Parses a boolean the way the kernel's `kstrtobool` does: only the first
/// one or two characters matter.
pub fn parse_bool(buf: &str) -> Result<bool> {
    let mut chars = buf.chars();
    match chars.next() {
        Some('y' | 'Y' | 't' | 'T' | '1') => Ok(true),
        Some('n' | 'N' | 'f' | 'F' | '0') => Ok(false),
        Some('o' | 'O') => match chars.next() {
            Some('n' | 'N') => Ok(true),
            Some('f' | 'F') => Ok(false),
            _ => Err(HddSaverError::invalid_input(format!("not a boolean: {:?}", buf))),
        },
        _ => Err(HddSaverError::invalid_input(format!("not a boolean: {:?}", buf))),
    }
}

/// Attribute read. Without a device the feature is absent and reads `Off`.
pub fn show(dev: Option<&Device>) -> String {
    let status = dev.map_or(false, Device::read_toggle);
    format!("{}\n", on_off(status))
}

/// Attribute write
pub fn store(dev: Option<&Device>, buf: &str) -> Result<usize> {
    let value = parse_bool(buf)?;
    let dev = dev.ok_or_else(|| HddSaverError::not_found("HDD Saver device is not bound"))?;

    info!("Trying to change HDD Saver to {}", on_off(value));
    dev.write_toggle(value)?;
    Ok(buf.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_tokens() {
        for t in ["1", "y", "Y", "yes", "t", "true", "on", "ON", "On\n", "1\n"] {
            assert!(parse_bool(t).unwrap(), "{:?}", t);
        }
        for f in ["0", "n", "N", "no", "f", "false", "off", "OFF", "Off\n", "0\n"] {
            assert!(!parse_bool(f).unwrap(), "{:?}", f);
        }
    }

    #[test]
    fn test_parse_bool_rejects_garbage() {
        for bad in ["", "\n", "2", "maybe", "o", "ox", " on", "enable"] {
            let err = parse_bool(bad).unwrap_err();
            assert!(matches!(err, HddSaverError::InvalidInput(_)), "{:?}", bad);
            assert_eq!(err.errno(), -libc::EINVAL);
        }
    }

    #[test]
    fn test_show_without_device_reads_off() {
        assert_eq!(show(None), "Off\n");
    }

    #[test]
    fn test_store_without_device() {
        assert!(matches!(store(None, "on"), Err(HddSaverError::NotFound(_))));
        assert!(matches!(store(None, "bogus"), Err(HddSaverError::InvalidInput(_))));
    }
}
