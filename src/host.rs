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

//! Real hardware backends: `/dev/port` and lock-file region ownership.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use hs_error::{HddSaverError, Result};

use crate::port::{IoRegions, PortIo};

/// Port I/O through the `/dev/port` character device
#[derive(Debug)]
pub struct DevPort {
    file: File,
}

impl DevPort {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| open_error(path, e))?;
        Ok(Self { file })
    }
}

impl PortIo for DevPort {
    fn inb(&self, port: u16) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.file.read_exact_at(&mut buf, u64::from(port))?;
        Ok(buf[0])
    }

    fn outb(&self, port: u16, value: u8) -> io::Result<()> {
        self.file.write_all_at(&[value], u64::from(port))
    }
}

/// Region ownership shared between cooperating processes.
///
/// Each port is guarded by an `flock`ed file in the lock directory, so two
/// hddsaver invocations never interleave Super-I/O sequences. Kernel drivers
/// do not see these locks.
#[derive(Debug)]
pub struct LockFileRegions {
    dir: PathBuf,
    held: Mutex<HashMap<(u16, u16), Vec<File>>>,
}

impl LockFileRegions {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| open_error(&dir, e))?;
        Ok(Self {
            dir,
            held: Mutex::new(HashMap::new()),
        })
    }

    fn lock_path(&self, port: u16) -> PathBuf {
        self.dir.join(format!("hddsaver-io-{:04x}.lock", port))
    }

    fn lock_port(&self, port: u16, owner: &str) -> Result<Option<File>> {
        let path = self.lock_path(port);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| open_error(&path, e))?;

        // SAFETY: flock only operates on the descriptor, which `file` keeps open.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                return Ok(None);
            }
            return Err(err.into());
        }

        // Owner tag is informational only
        let _ = file.set_len(0);
        let _ = writeln!(file, "{} {}", owner, std::process::id());
        Ok(Some(file))
    }
}

impl IoRegions for LockFileRegions {
    fn try_claim(&self, start: u16, len: u16, owner: &'static str) -> Result<bool> {
        let mut held = self.held.lock();
        let end = u32::from(start) + u32::from(len);
        let overlaps = held.keys().any(|&(s, l)| {
            let (s, e) = (u32::from(s), u32::from(s) + u32::from(l));
            s < end && u32::from(start) < e
        });
        if overlaps {
            return Ok(false);
        }

        let mut files = Vec::with_capacity(usize::from(len));
        for port in start..start.saturating_add(len) {
            match self.lock_port(port, owner)? {
                Some(file) => files.push(file),
                None => {
                    debug!("I/O port {:#x} is locked by another process", port);
                    return Ok(false);
                }
            }
        }
        held.insert((start, len), files);
        Ok(true)
    }

    fn release(&self, start: u16, len: u16) {
        // Closing the files drops the locks
        self.held.lock().remove(&(start, len));
    }
}

fn open_error(path: &Path, e: io::Error) -> HddSaverError {
    match e.raw_os_error() {
        Some(libc::EMFILE | libc::ENFILE | libc::ENOMEM) => {
            HddSaverError::OutOfResources(format!("{}: {}", path.display(), e))
        }
        Some(libc::EACCES | libc::EPERM) => {
            HddSaverError::PermissionDenied(format!("{}: {}", path.display(), e))
        }
        _ => HddSaverError::Open {
            path: path.to_path_buf(),
            source: e,
        },
    }
}
