//! Append-only local experiment log.
//!
//! One serialized result payload per line, CRLF terminated.  On the device
//! the path lives on the SPIFFS partition mounted at `/flash`; on the host
//! it is any writable path.
//!
//! The file is opened once at boot.  If that fails the caller leaves the
//! sink out for the rest of the process lifetime.

use std::fs::{File, OpenOptions};
use std::io::Write;

use log::{info, warn};

use crate::app::ports::LocalLogPort;
use crate::error::SinkError;

pub struct FileLog {
    file: File,
    lines: u32,
}

impl FileLog {
    /// Open (or create) `path` for appending.
    pub fn open(path: &str) -> Result<Self, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                warn!("Local log: cannot open {}: {}", path, e);
                SinkError::LocalIo
            })?;
        info!("Local log: appending to {}", path);
        Ok(Self { file, lines: 0 })
    }

    /// Lines appended by this process.
    pub fn lines_written(&self) -> u32 {
        self.lines
    }
}

impl LocalLogPort for FileLog {
    fn append_line(&mut self, line: &str) -> Result<(), SinkError> {
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.write_all(b"\r\n"))
            .and_then(|()| self.file.flush())
            .map_err(|e| {
                warn!("Local log: write failed: {}", e);
                SinkError::LocalIo
            })?;
        self.lines += 1;
        Ok(())
    }
}

/// Mount the SPIFFS data partition at `/flash`.
#[cfg(target_os = "espidf")]
pub fn mount_flash() -> Result<(), SinkError> {
    use esp_idf_svc::sys::{ESP_OK, esp_vfs_spiffs_conf_t, esp_vfs_spiffs_register};

    let conf = esp_vfs_spiffs_conf_t {
        base_path: c"/flash".as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 2,
        format_if_mount_failed: true,
    };
    // SAFETY: `conf` and its C strings outlive the call; registration copies
    // what it needs.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret != ESP_OK {
        warn!("Local log: SPIFFS mount failed ({})", ret);
        return Err(SinkError::LocalIo);
    }
    info!("Local log: SPIFFS mounted at /flash");
    Ok(())
}
