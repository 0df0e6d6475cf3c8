// Keystorage — Exclusive keystore lock
//
// A store holds an exclusive advisory lock on `<keystore>.lock` for as long
// as it is open. A second open of the same keystore, from this process or
// another, fails immediately instead of racing read-modify-write cycles.
//
// Unix uses flock(2). Other targets get a no-op lock and rely on the
// single-owner precondition.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Lock file path for a keystore: the keystore path with `.lock` appended.
pub fn lock_path(keystore: &Path) -> PathBuf {
    let mut name = OsString::from(keystore.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// An exclusive lock, released when dropped.
#[derive(Debug)]
pub struct KeystoreLock {
    file: File,
    path: PathBuf,
}

impl KeystoreLock {
    /// Take the lock for `keystore` without blocking.
    ///
    /// Fails with `WouldBlock` if another owner holds it.
    pub fn acquire(keystore: &Path) -> io::Result<Self> {
        let path = lock_path(keystore);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if !try_lock_exclusive(&file)? {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("keystore {} is in use by another owner", keystore.display()),
            ));
        }

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for KeystoreLock {
    fn drop(&mut self) {
        let _ = unlock(&self.file);
    }
}

// ─── Unix flock ──────────────────────────────────────────────────────────────

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }

    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(unix)]
fn unlock(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

// ─── Fallback ────────────────────────────────────────────────────────────────

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
    Ok(true)
}

#[cfg(not(unix))]
fn unlock(_file: &File) -> io::Result<()> {
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path_appends_suffix() {
        assert_eq!(
            lock_path(Path::new("/var/lib/keystore.json")),
            PathBuf::from("/var/lib/keystore.json.lock")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = dir.path().join("keystore.json");

        let first = KeystoreLock::acquire(&keystore).unwrap();
        let second = KeystoreLock::acquire(&keystore);
        assert_eq!(
            second.unwrap_err().kind(),
            io::ErrorKind::WouldBlock,
            "A held lock must not be granted twice"
        );

        drop(first);
        assert!(
            KeystoreLock::acquire(&keystore).is_ok(),
            "Lock must be reusable after release"
        );
    }
}
