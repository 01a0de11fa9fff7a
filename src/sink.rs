//! Output file sink for received frame payloads.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Appends frame payloads to a single output file.
///
/// Opened in create-or-truncate mode once per session; payloads are written
/// back to back with no delimiter or length prefix between them. A new
/// session on the same path discards whatever an earlier one wrote.
#[derive(Debug)]
pub struct FrameSink {
    file: File,
    bytes_written: u64,
}

impl FrameSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        Ok(Self {
            file,
            bytes_written: 0,
        })
    }

    /// Append one payload verbatim.
    pub fn append(&mut self, payload: &[u8]) -> io::Result<()> {
        self.file.write_all(payload)?;
        self.bytes_written = self.bytes_written.saturating_add(payload.len() as u64);
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_concatenate_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.raw");

        let mut sink = FrameSink::create(&path).unwrap();
        sink.append(b"abcd").unwrap();
        sink.append(b"").unwrap();
        sink.append(b"xyz").unwrap();
        drop(sink);

        assert_eq!(std::fs::read(&path).unwrap(), b"abcdxyz");
    }

    #[test]
    fn counts_bytes_including_empty_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.raw");

        let mut sink = FrameSink::create(&path).unwrap();
        sink.append(&[0u8; 4]).unwrap();
        sink.append(&[0u8; 1024]).unwrap();
        sink.append(&[]).unwrap();
        assert_eq!(sink.bytes_written(), 1028);
    }

    #[test]
    fn create_truncates_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.raw");
        std::fs::write(&path, b"stale session data").unwrap();

        let mut sink = FrameSink::create(&path).unwrap();
        sink.append(b"new").unwrap();
        drop(sink);

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn create_fails_on_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("audio.raw");
        assert!(FrameSink::create(&path).is_err());
    }
}
