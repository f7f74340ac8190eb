use crate::Cli;
use ansi_term::Style;
use gwbasic::file::drive::LocalDrives;
use gwbasic::file::http::HttpSource;
use gwbasic::file::{files_listing, ProgramSource};
use gwbasic::lang::Error;
use gwbasic::mach::{Event, KeySender, Runtime, FUNCTION_KEYS};
use linefeed::{Command, Function, Interface, Prompter, ReadResult, Signal, Terminal};
use std::sync::Arc;
use tracing::{info, warn};

pub fn main(cli: Cli) {
    if let Err(error) = main_loop(cli) {
        eprintln!("{}", error);
    }
}

fn program_source(cli: &Cli) -> Box<dyn ProgramSource> {
    match &cli.server {
        Some(server) => {
            info!(%server, "reading programs from file server");
            Box::new(HttpSource::new(server, &cli.cwd))
        }
        None => {
            let mut drives = LocalDrives::new(&cli.cwd);
            if cli.drives.is_empty() {
                match std::env::current_dir() {
                    Ok(dir) => drives.map('C', dir),
                    Err(error) => warn!(%error, "no working directory for drive C"),
                }
            }
            for (letter, dir) in &cli.drives {
                drives.map(*letter, dir.clone());
            }
            Box::new(drives)
        }
    }
}

fn main_loop(cli: Cli) -> std::io::Result<()> {
    let source = program_source(&cli);
    let mut runtime = Runtime::default();
    let sender = runtime.key_sender();
    let break_sender = sender.clone();
    if let Err(error) = ctrlc::set_handler(move || break_sender.send_break()) {
        warn!(%error, "Ctrl-C handler not installed");
    }

    let command = Interface::new("BASIC")?;
    command.set_report_signal(Signal::Interrupt, true);
    KeyMacro::install(&command, &sender);

    if cli.trace {
        runtime.enter("TRON");
    }
    if let Some(program) = &cli.program {
        runtime.enter(&format!("RUN \"{}\"", program));
    }

    let mut print_ok = true;
    loop {
        match runtime.execute(5000) {
            Event::Stopped => {
                if print_ok && runtime.auto_line().is_none() {
                    command.write_fmt(format_args!("Ok\n"))?;
                }
                let prompt = match runtime.auto_line() {
                    Some(n) => format!("{} ", n),
                    None => String::new(),
                };
                command.set_prompt(&prompt)?;
                match command.read_line()? {
                    ReadResult::Input(string) => {
                        print_ok = !string.trim_start().starts_with(|c: char| c.is_ascii_digit())
                            && runtime.auto_line().is_none();
                        if runtime.enter(&string) {
                            command.add_history_unique(string);
                        }
                    }
                    ReadResult::Signal(Signal::Interrupt) => {
                        command.set_buffer("")?;
                        command.lock_reader().cancel_read_line()?;
                        runtime.interrupt();
                        print_ok = true;
                    }
                    ReadResult::Signal(_) | ReadResult::Eof => break,
                }
            }
            Event::Running => {}
            Event::Print(s) => {
                command.write_fmt(format_args!("{}", s))?;
            }
            Event::Errors(errors) => {
                for error in errors.iter() {
                    print_error(&command, error)?;
                }
                print_ok = true;
            }
            Event::Load(request) => {
                info!(path = %request.path, kind = ?request.kind, "loading");
                runtime.complete_load(source.fetch(&request.path));
            }
            Event::Files(pattern) => match source.list(&pattern) {
                Ok(entries) => command.write_fmt(format_args!("{}", files_listing(&entries)))?,
                Err(error) => print_error(&command, &error)?,
            },
        }
    }
    Ok(())
}

fn print_error<T: Terminal>(command: &Interface<T>, error: &Error) -> std::io::Result<()> {
    command.write_fmt(format_args!(
        "{}\n",
        Style::new().bold().paint(error.to_string())
    ))
}

/// Types the text assigned with KEY when a function key is pressed.
struct KeyMacro {
    seq: &'static [u8],
    sender: KeySender,
}

impl KeyMacro {
    fn install<T: Terminal>(i: &Interface<T>, sender: &KeySender) {
        for (n, &seq) in FUNCTION_KEYS.iter().enumerate() {
            let name = format!("key-macro-{}", n + 1);
            i.define_function(
                name.clone(),
                Arc::new(KeyMacro {
                    seq,
                    sender: sender.clone(),
                }),
            );
            i.bind_sequence(
                String::from_utf8_lossy(seq).to_string(),
                Command::from_string(name),
            );
        }
    }
}

impl<Term: Terminal> Function<Term> for KeyMacro {
    fn execute(&self, prompter: &mut Prompter<Term>, _count: i32, _ch: char) -> std::io::Result<()> {
        match self.sender.macro_text(self.seq) {
            Some(text) => prompter.insert_str(&text),
            None => Ok(()),
        }
    }
}
