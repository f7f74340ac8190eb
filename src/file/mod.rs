/*!
## File Module

Where programs come from. The runtime only ever sees bytes; this module
resolves BASIC file names like `C:\GAMES\MENU.BAS` against local
directories or an HTTP file server.

*/

pub mod drive;
pub mod http;

use crate::error;
use crate::lang::Error;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, Error>;

/// Something that can hand out program files and directory listings.
pub trait ProgramSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>>;
    fn list(&self, path: &str) -> Result<Vec<DirEntry>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "isDirectory", alias = "isdir")]
    pub is_directory: bool,
}

impl DirEntry {
    pub fn new(name: &str, is_directory: bool) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            is_directory,
        }
    }
}

/// Serialize a listing, leaving out hidden entries.
pub fn directory_json(entries: &[DirEntry]) -> Result<String> {
    let visible: Vec<&DirEntry> = entries
        .iter()
        .filter(|e| !e.name.rsplit('/').next().unwrap_or("").starts_with('.'))
        .collect();
    serde_json::to_string(&visible).map_err(|e| error!(InternalErr; &e.to_string()))
}

/// True when any `/` separated part of the name starts with a period.
pub fn contains_dot_file(name: &str) -> bool {
    name.split('/').any(|part| part.starts_with('.'))
}

/// Render a name the way FILES shows it: `NAME    .EXT` followed by
/// `<dir>` or four blanks. Base names over eight characters show seven
/// and a `+`.
pub fn format_file_name(name: &str, is_dir: bool) -> String {
    let mut parts = name.split('.');
    let base = parts.next().unwrap_or("");
    let ext = parts.next().unwrap_or(" ");
    let base = if base.chars().count() > 8 {
        let mut s: String = base.chars().take(7).collect();
        s.push('+');
        s
    } else {
        base.to_string()
    };
    let tag = if is_dir { "<dir>" } else { "    " };
    format!("{:<8.8}.{:<3.3}{}", base, ext, tag)
}

/// FILES output, one entry per line.
pub fn files_listing(entries: &[DirEntry]) -> String {
    let mut s = String::new();
    for entry in entries {
        if contains_dot_file(&entry.name) {
            continue;
        }
        s.push_str(&format_file_name(&entry.name, entry.is_directory));
        s.push('\n');
    }
    s
}
