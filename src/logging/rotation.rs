//! Size-bounded log file with numbered backups.
//!
//! `server.log` is written until the next record would push it past the
//! size limit; it is then renamed to `server.log.1`, existing backups shift
//! up by one, and the oldest backup beyond the limit is removed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writer that rotates its file once it reaches `max_bytes`.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    /// Opens (or creates) `dir/name` in append mode, creating `dir` first.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory or file cannot be
    /// created.
    pub fn open(dir: &Path, name: &str, max_bytes: u64, max_backups: usize) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            max_backups,
            file,
            written,
        })
    }

    /// Path of the live log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_backups > 0 {
            let oldest = self.backup_path(self.max_backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.max_backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }

        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let incoming = u64::try_from(buf.len()).unwrap_or(u64::MAX);
        if self.written > 0 && self.written.saturating_add(incoming) > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written = self
            .written
            .saturating_add(u64::try_from(n).unwrap_or(u64::MAX));
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lobby-rotation-{tag}-{}", uuid::Uuid::new_v4()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn rotates_when_limit_exceeded() {
        let dir = scratch_dir("rotate");
        let Ok(mut file) = RotatingFile::open(&dir, "server.log", 10, 2) else {
            panic!("open failed");
        };
        assert!(file.write_all(b"0123456789").is_ok());
        assert!(file.write_all(b"abc").is_ok());

        let current = fs::read_to_string(dir.join("server.log")).unwrap_or_default();
        let backup = fs::read_to_string(dir.join("server.log.1")).unwrap_or_default();
        assert_eq!(current, "abc");
        assert_eq!(backup, "0123456789");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn drops_backups_beyond_limit() {
        let dir = scratch_dir("limit");
        let Ok(mut file) = RotatingFile::open(&dir, "server.log", 4, 2) else {
            panic!("open failed");
        };
        for chunk in [b"aaaa", b"bbbb", b"cccc", b"dddd"] {
            assert!(file.write_all(chunk).is_ok());
        }

        assert_eq!(fs::read_to_string(dir.join("server.log")).unwrap_or_default(), "dddd");
        assert_eq!(fs::read_to_string(dir.join("server.log.1")).unwrap_or_default(), "cccc");
        assert_eq!(fs::read_to_string(dir.join("server.log.2")).unwrap_or_default(), "bbbb");
        assert!(!dir.join("server.log.3").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn reopening_appends() {
        let dir = scratch_dir("append");
        {
            let Ok(mut file) = RotatingFile::open(&dir, "server.log", 1024, 1) else {
                panic!("open failed");
            };
            assert!(file.write_all(b"first\n").is_ok());
        }
        let Ok(mut file) = RotatingFile::open(&dir, "server.log", 1024, 1) else {
            panic!("reopen failed");
        };
        assert!(file.write_all(b"second\n").is_ok());
        assert_eq!(
            fs::read_to_string(file.path()).unwrap_or_default(),
            "first\nsecond\n"
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
