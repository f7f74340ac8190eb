use super::{contains_dot_file, DirEntry, ProgramSource};
use crate::error;
use crate::lang::Error;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

type Result<T> = std::result::Result<T, Error>;

/// True when the path starts with a drive letter and a colon.
pub fn check_for_drive(path: &str) -> bool {
    let mut chars = path.chars();
    matches!((chars.next(), chars.next()), (Some(c), Some(':')) if c.is_ascii_alphabetic())
}

fn drive_name(path: &str) -> String {
    let letter = path
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('C');
    format!("drive{}", letter)
}

/// Join path parts, dropping empty parts and resolving `.` and `..`.
fn join(parts: &[&str]) -> String {
    let mut out: Vec<&str> = vec![];
    for part in parts {
        for segment in part.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if out.len() > 1 {
                        out.pop();
                    }
                }
                s => out.push(s),
            }
        }
    }
    out.join("/")
}

/// Turn a BASIC file name into a drive-relative path.
///
/// `C:\DIR\FILE.EXT` becomes `driveC/DIR/FILE.EXT`. Names without a drive
/// are taken relative to `cwd`, or to its drive root when they start with
/// a backslash.
pub fn convert_drive(target: &str, cwd: &str) -> String {
    let cwd = cwd.replace('\\', "/");
    if target.is_empty() {
        return drive_name(&cwd);
    }
    let target = target.replace('\\', "/");
    if check_for_drive(&target) {
        return join(&[&drive_name(&target), &target[2..]]);
    }
    if target.starts_with('/') {
        return join(&[&drive_name(&cwd), &target]);
    }
    let cwd_dir = if check_for_drive(&cwd) { &cwd[2..] } else { "" };
    join(&[&drive_name(&cwd), cwd_dir, &target])
}

/// Serves drive letters from local directories.
pub struct LocalDrives {
    drives: HashMap<char, PathBuf>,
    cwd: String,
}

impl LocalDrives {
    pub fn new(cwd: &str) -> LocalDrives {
        LocalDrives {
            drives: HashMap::new(),
            cwd: cwd.to_string(),
        }
    }

    pub fn map(&mut self, letter: char, dir: PathBuf) {
        self.drives.insert(letter.to_ascii_uppercase(), dir);
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let converted = convert_drive(path, &self.cwd);
        if contains_dot_file(&converted) {
            return Err(error!(PermissionDenied));
        }
        let mut segments = converted.split('/');
        let letter = segments
            .next()
            .and_then(|d| d.strip_prefix("drive"))
            .and_then(|d| d.chars().next())
            .ok_or_else(|| error!(PathNotFound))?;
        let mut resolved = match self.drives.get(&letter) {
            Some(dir) => dir.clone(),
            None => return Err(error!(PathNotFound)),
        };
        for segment in segments {
            let name = match_case(&resolved, segment);
            resolved.push(name);
        }
        debug!(path, resolved = %resolved.display(), "resolved file name");
        Ok(resolved)
    }
}

/// BASIC names are upper case; find the local entry that matches regardless of case.
fn match_case(dir: &Path, segment: &str) -> String {
    if dir.join(segment).exists() {
        return segment.to_string();
    }
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.eq_ignore_ascii_case(segment) {
                return name;
            }
        }
    }
    segment.to_string()
}

fn io_error(error: std::io::Error) -> Error {
    match error.kind() {
        ErrorKind::NotFound => error!(FileNotFound),
        ErrorKind::PermissionDenied => error!(PermissionDenied),
        _ => error!(DeviceFault; &error.to_string()),
    }
}

impl ProgramSource for LocalDrives {
    fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let resolved = self.resolve(path)?;
        std::fs::read(&resolved).map_err(io_error)
    }

    fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let resolved = self.resolve(path)?;
        let mut entries = vec![];
        for entry in std::fs::read_dir(&resolved).map_err(|e| match e.kind() {
            ErrorKind::NotFound => error!(PathNotFound),
            _ => io_error(e),
        })? {
            let entry = entry.map_err(io_error)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let is_directory = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push(DirEntry { name, is_directory });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_for_drive() {
        assert!(!check_for_drive("/"));
        assert!(check_for_drive("c:/"));
        assert!(!check_for_drive("menu"));
    }

    #[test]
    fn test_convert_drive() {
        assert_eq!(convert_drive("", "c:"), "driveC");
        assert_eq!(convert_drive("C:\\", "c:"), "driveC");
        assert_eq!(convert_drive("c:\\", "c:\\"), "driveC");
        assert_eq!(convert_drive("\\menu", "c:\\"), "driveC/menu");
        assert_eq!(
            convert_drive("prog\\test.bas", "c:/menu"),
            "driveC/menu/prog/test.bas"
        );
        assert_eq!(convert_drive("a:game.bas", "c:\\"), "driveA/game.bas");
    }

    #[test]
    fn test_dot_files_are_refused() {
        let mut drives = LocalDrives::new("C:\\");
        drives.map('c', std::env::temp_dir());
        let e = drives.fetch(".secret").unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::PermissionDenied));
    }

    #[test]
    fn test_unmapped_drive() {
        let drives = LocalDrives::new("C:\\");
        let e = drives.fetch("Z:\\MENU.BAS").unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::PathNotFound));
    }
}
