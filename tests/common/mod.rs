#![allow(dead_code)]
use gwbasic::error;
use gwbasic::file::{files_listing, DirEntry, ProgramSource};
use gwbasic::lang::Error;
use gwbasic::mach::{Event, Runtime};
use std::collections::BTreeMap;

/// Programs served from memory, keyed by upper-case file name.
#[derive(Default)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn with(mut self, name: &str, bytes: &[u8]) -> MemorySource {
        self.files.insert(name.to_ascii_uppercase(), bytes.to_vec());
        self
    }
}

impl ProgramSource for MemorySource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, Error> {
        let name = path.trim_start_matches("C:\\").to_ascii_uppercase();
        self.files
            .get(&name)
            .cloned()
            .ok_or_else(|| error!(FileNotFound))
    }

    fn list(&self, _path: &str) -> Result<Vec<DirEntry>, Error> {
        Ok(self
            .files
            .keys()
            .map(|name| DirEntry::new(name, false))
            .collect())
    }
}

pub fn exec(runtime: &mut Runtime) -> String {
    exec_n(runtime, 5000)
}

pub fn exec_n(runtime: &mut Runtime, cycles: usize) -> String {
    exec_with(runtime, cycles, &MemorySource::default())
}

pub fn exec_files(runtime: &mut Runtime, source: &MemorySource) -> String {
    exec_with(runtime, 5000, source)
}

fn exec_with(runtime: &mut Runtime, cycles: usize, source: &dyn ProgramSource) -> String {
    let mut s = String::new();
    let mut prev_running = false;
    loop {
        let event = runtime.execute(cycles);
        match &event {
            Event::Stopped => {
                break;
            }
            Event::Errors(errors) => {
                for error in errors.iter() {
                    s.push_str(&format!("{}\n", error));
                }
            }
            Event::Running => {
                if prev_running {
                    s.push_str(&format!("\n{} Execution cycles exceeded.\n", cycles));
                    break;
                }
            }
            Event::Print(ps) => {
                s.push_str(ps);
            }
            Event::Load(request) => {
                runtime.complete_load(source.fetch(&request.path));
            }
            Event::Files(pattern) => match source.list(pattern) {
                Ok(entries) => s.push_str(&files_listing(&entries)),
                Err(error) => s.push_str(&format!("{}\n", error)),
            },
        }
        prev_running = matches!(event, Event::Running);
    }
    s
}
