//! Minimal `BackupReader`: the real backup is a PDF carrying the two
//! encrypted keys as printable text plus the wallet birthday; extracting
//! text from a PDF is out of this crate's scope, so this reader expects the
//! same three values already extracted into a plain-text file, one per
//! line: user key, cosigner key, birthday (decimal block height, `0` if
//! unknown).

use std::path::{Path, PathBuf};

use recovery_common::{BackupContents, BackupReader, Error};

pub struct FileBackupReader {
    path: PathBuf,
}

impl FileBackupReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BackupReader for FileBackupReader {
    fn read(&self) -> Result<BackupContents, Error> {
        read_backup_file(&self.path)
    }
}

fn read_backup_file(path: &Path) -> Result<BackupContents, Error> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::BackupUnreadable(format!("{}: {e}", path.display())))?;

    let mut lines = raw.lines().map(str::trim).filter(|l| !l.is_empty());

    let encrypted_user_key = lines
        .next()
        .ok_or_else(|| Error::BackupUnreadable("missing user key line".to_string()))?
        .to_string();
    let encrypted_cosigner_key = lines
        .next()
        .ok_or_else(|| Error::BackupUnreadable("missing cosigner key line".to_string()))?
        .to_string();
    let birthday = lines
        .next()
        .map(|s| s.parse::<u32>())
        .transpose()
        .map_err(|e| Error::BackupUnreadable(format!("bad birthday: {e}")))?
        .unwrap_or(0);

    Ok(BackupContents {
        encrypted_user_key,
        encrypted_cosigner_key,
        birthday,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_keys_and_birthday_from_three_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userkey123").unwrap();
        writeln!(file, "cosignerkey456").unwrap();
        writeln!(file, "650000").unwrap();

        let backup = FileBackupReader::new(file.path()).read().unwrap();
        assert_eq!(backup.encrypted_user_key, "userkey123");
        assert_eq!(backup.encrypted_cosigner_key, "cosignerkey456");
        assert_eq!(backup.birthday, 650000);
    }

    #[test]
    fn defaults_birthday_when_line_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userkey123").unwrap();
        writeln!(file, "cosignerkey456").unwrap();

        let backup = FileBackupReader::new(file.path()).read().unwrap();
        assert_eq!(backup.birthday, 0);
    }

    #[test]
    fn rejects_a_missing_file() {
        let err = FileBackupReader::new("/nonexistent/path/backup.txt").read().unwrap_err();
        assert!(matches!(err, Error::BackupUnreadable(_)));
    }
}
