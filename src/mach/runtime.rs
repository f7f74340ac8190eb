use super::keys::{KeyBuffer, KeySender};
use super::program::{Cursor, DataItem, Program};
use super::settings::{AutoNumber, Settings};
use super::{Function, Operation, Stack, Val, Var};
use crate::error;
use crate::lang::ast::{Datum, Expression, Ident, PrintItem, ResumeAt, Statement, Variable};
use crate::lang::{lex, parse, Error, Line};
use std::collections::{HashMap, VecDeque};
use std::convert::TryFrom;
use std::rc::Rc;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, Error>;

const PRINT_ZONE: usize = 14;
const MAX_FN_DEPTH: usize = 64;

/// ## Interpreter session
///
/// Lines go in through [`Runtime::enter`]. Numbered lines edit the program,
/// anything else runs right away. The host then calls [`Runtime::execute`]
/// until it answers [`Event::Stopped`], handling output and file requests
/// along the way.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    /// Running an ON ERROR handler.
    Trapped,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadKind {
    Load { run: bool },
    Merge,
    Chain { line: Option<u16>, all: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub path: String,
    pub kind: LoadKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Stopped,
    Running,
    Print(String),
    Errors(Vec<Error>),
    /// The host fetches the file and answers with [`Runtime::complete_load`].
    Load(LoadRequest),
    /// The host lists files matching the pattern.
    Files(String),
}

#[derive(Debug)]
enum Frame {
    Gosub(Option<Cursor>),
    For {
        var: Ident,
        to: Val,
        step: Val,
        body: Option<Cursor>,
    },
    While(Cursor),
}

pub struct Runtime {
    program: Program,
    settings: Settings,
    vars: Var,
    functions: Function,
    user_fns: HashMap<Ident, (Vec<Ident>, Expression)>,
    fn_depth: usize,
    stack: Stack<Frame>,
    data: Option<Vec<DataItem>>,
    data_pos: usize,
    state: State,
    cursor: Option<Cursor>,
    current: Cursor,
    traced: Option<u16>,
    events: VecDeque<Event>,
    /// Direct lines entered while another one was still running.
    waiting: VecDeque<Line>,
    loading: Option<LoadRequest>,
    keys: KeyBuffer,
    column: usize,
}

impl Default for Runtime {
    fn default() -> Runtime {
        Runtime {
            program: Program::default(),
            settings: Settings::default(),
            vars: Var::new(),
            functions: Function::default(),
            user_fns: HashMap::new(),
            fn_depth: 0,
            stack: Stack::new("STACK OVERFLOW"),
            data: None,
            data_pos: 0,
            state: State::Idle,
            cursor: None,
            current: Cursor::new(None),
            traced: None,
            events: VecDeque::new(),
            waiting: VecDeque::new(),
            loading: None,
            keys: KeyBuffer::default(),
            column: 0,
        }
    }
}

impl Runtime {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn key_sender(&self) -> KeySender {
        self.keys.sender()
    }

    /// Line number AUTO will assign to the next entry.
    pub fn auto_line(&self) -> Option<u16> {
        self.settings.auto.map(|a| a.next)
    }

    fn is_running(&self) -> bool {
        matches!(self.state, State::Running | State::Trapped)
    }

    /// Enter a line of source. Returns false when it did not parse.
    pub fn enter(&mut self, s: &str) -> bool {
        let mut text = s.trim_end_matches(&['\r', '\n'][..]).to_string();
        if self.settings.auto.is_some() && !text.trim_start().starts_with(|c: char| c.is_ascii_digit())
        {
            if let Some(n) = self.settings.next_auto() {
                if text.trim().is_empty() {
                    return true;
                }
                text = format!("{} {}", n, text);
            }
        }
        let (lines, errors) = parse(&lex(&text));
        if !errors.is_empty() {
            self.events.push_back(Event::Errors(errors));
            return false;
        }
        for line in lines {
            if line.is_direct() {
                if line.is_empty() {
                    continue;
                }
                if self.is_busy() {
                    self.waiting.push_back(line);
                } else {
                    self.start_direct(line);
                }
            } else {
                self.program.insert(line);
                self.settings.restart = None;
                self.data = None;
                self.data_pos = 0;
            }
        }
        true
    }

    fn is_busy(&self) -> bool {
        self.is_running() || self.loading.is_some() || !self.waiting.is_empty()
    }

    fn start_direct(&mut self, line: Line) {
        self.program.insert(line);
        self.cursor = Some(self.program.direct_start());
        self.state = State::Running;
    }

    /// Run up to `cycles` statements.
    pub fn execute(&mut self, cycles: usize) -> Event {
        for _ in 0..cycles {
            if let Some(event) = self.events.pop_front() {
                return event;
            }
            if let Some(request) = &self.loading {
                return Event::Load(request.clone());
            }
            if !self.is_running() {
                match self.waiting.pop_front() {
                    Some(line) => self.start_direct(line),
                    None => return Event::Stopped,
                }
                continue;
            }
            if self.keys.break_seen() {
                self.keys.clear_break();
                self.interrupt();
                continue;
            }
            if let Err(error) = self.step() {
                self.raise(error);
            }
        }
        if let Some(event) = self.events.pop_front() {
            return event;
        }
        if self.is_running() || !self.waiting.is_empty() {
            Event::Running
        } else {
            Event::Stopped
        }
    }

    /// Break into a running program or leave AUTO mode.
    pub fn interrupt(&mut self) {
        self.settings.auto = None;
        self.loading = None;
        self.waiting.clear();
        if self.is_running() {
            if let Some(n) = self.current.line {
                self.break_message(n);
                self.settings.restart = self.cursor.clone();
            }
            self.halt(State::Stopped);
        }
    }

    /// Answer an [`Event::Load`].
    pub fn complete_load(&mut self, result: std::result::Result<Vec<u8>, Error>) {
        let request = match self.loading.take() {
            Some(request) => request,
            None => return,
        };
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(error) => return self.raise(error),
        };
        let (program, errors) = Program::from_bytes(&bytes);
        if !errors.is_empty() {
            self.events.push_back(Event::Errors(errors));
        }
        debug!(path = %request.path, lines = program.line_count(), "load complete");
        match request.kind {
            LoadKind::Load { run } => {
                self.program = program;
                self.clear();
                if run {
                    self.cursor = self.program.first_line().map(|n| Cursor::new(Some(n)));
                    self.state = State::Running;
                } else {
                    self.halt(State::Idle);
                }
            }
            LoadKind::Merge => {
                if program.is_protected() {
                    return self.raise(error!(IllegalFuncCall));
                }
                self.program.merge(program);
                self.settings.restart = None;
                self.data = None;
                self.halt(State::Idle);
            }
            LoadKind::Chain { line, all } => {
                if !all {
                    let common = self.program.common();
                    self.vars.retain(&common);
                }
                self.program = program;
                self.user_fns.clear();
                self.stack.clear();
                self.data = None;
                self.data_pos = 0;
                self.settings.clear_trap();
                self.settings.restart = None;
                self.state = State::Running;
                self.cursor = match line {
                    Some(n) => match self.program.start(n) {
                        Ok(cursor) => Some(cursor),
                        Err(error) => return self.raise(error),
                    },
                    None => self.program.first_line().map(|n| Cursor::new(Some(n))),
                };
            }
        }
    }

    fn step(&mut self) -> Result<()> {
        let cursor = match self.cursor.take() {
            Some(cursor) => cursor,
            None => return self.end_of_program(),
        };
        let stmt = match self.program.statement(&cursor) {
            Some(stmt) => stmt.clone(),
            None => return self.end_of_program(),
        };
        if let Some(n) = cursor.line {
            if self.settings.tracing && (self.traced != Some(n) || cursor.path == [0]) {
                self.put(&format!("[{}]", n));
            }
        }
        self.traced = cursor.line;
        self.cursor = self.program.advance(&cursor);
        self.current = cursor;
        self.statement(stmt)
    }

    fn end_of_program(&mut self) -> Result<()> {
        if self.state == State::Trapped {
            return Err(error!(NoResume));
        }
        self.halt(State::Idle);
        Ok(())
    }

    fn halt(&mut self, state: State) {
        self.state = state;
        self.cursor = None;
        self.traced = None;
    }

    /// Trap the error or stop with it.
    fn raise(&mut self, error: Error) {
        let line = self.current.line;
        let error = if error.is_direct() && line.is_some() {
            error.in_line_number(line)
        } else {
            error
        };
        self.settings.err = error.code();
        self.settings.erl = error.line_number();
        if let (Some(handler), State::Running) = (self.settings.on_error, self.state) {
            if let Ok(cursor) = self.program.start(handler) {
                info!(code = error.code(), line = ?line, handler, "error trapped");
                self.settings.resume = Some(self.current.clone());
                self.cursor = Some(cursor);
                self.state = State::Trapped;
                return;
            }
        }
        debug!(%error, "execution halted");
        self.settings.restart = None;
        self.halt(State::Stopped);
        if self.column > 0 {
            self.put("\n");
        }
        self.events.push_back(Event::Errors(vec![error]));
    }

    fn put(&mut self, s: &str) {
        self.column = column_after(self.column, s);
        if let Some(Event::Print(buf)) = self.events.back_mut() {
            buf.push_str(s);
        } else {
            self.events.push_back(Event::Print(s.to_string()));
        }
    }

    fn break_message(&mut self, line: u16) {
        let s = if self.column > 0 {
            format!("\nBreak in {}\n", line)
        } else {
            format!("Break in {}\n", line)
        };
        self.put(&s);
    }

    fn statement(&mut self, stmt: Statement) -> Result<()> {
        use Statement as S;
        match stmt {
            S::Auto(start, step) => {
                self.settings.auto = Some(AutoNumber {
                    next: start.unwrap_or(10),
                    step: step.unwrap_or(10),
                });
                self.halt(State::Idle);
            }
            S::Beep => self.put("\x07"),
            S::Chain(path, line, all) => {
                let path = self.string(&path)?;
                self.request_load(path, LoadKind::Chain { line, all });
            }
            S::Clear(args) => {
                self.optional_integers(&args)?;
                self.clear();
            }
            S::Cls => self.column = 0,
            S::Color(args) => {
                let args = self.optional_integers(&args)?;
                self.settings.color = merge_args(&self.settings.color, args);
            }
            S::Common(_) | S::Data(_) | S::Rem(_) => {}
            S::Cont => self.cont()?,
            S::Def(ident, params, expr) => {
                self.user_fns.insert(ident, (params, expr));
            }
            S::Dim(vars) => {
                for var in vars {
                    if let Variable::Array(ident, subscripts) = var {
                        let subscripts = self.eval_list(&subscripts)?;
                        self.vars.dimension_array(&ident, subscripts)?;
                    }
                }
            }
            S::End => self.end()?,
            S::Error(expr) => {
                let code = self.integer(&expr)?;
                if !(1..=255).contains(&code) {
                    return Err(error!(IllegalFuncCall));
                }
                return Err(Error::from_code(code as u16));
            }
            S::Files(pattern) => {
                let pattern = match pattern {
                    Some(expr) => self.string(&expr)?.to_string(),
                    None => String::new(),
                };
                self.events.push_back(Event::Files(pattern));
            }
            S::For(var, from, to, step) => self.r#for(var, &from, &to, step.as_ref())?,
            S::Gosub(n) => self.gosub(n)?,
            S::Goto(n) => self.goto(n)?,
            S::If(predicate, _, _) => {
                let branch = if self.eval(&predicate)?.is_true()? { 0 } else { 1 };
                if let Some(cursor) = self.program.enter_branch(&self.current, branch) {
                    self.cursor = Some(cursor);
                }
            }
            S::Key(num, text) => {
                let num = self.integer(&num)?;
                if !(1..=14).contains(&num) {
                    return Err(error!(IllegalFuncCall));
                }
                let text = self.string(&text)?;
                let text: String = text.chars().take(15).collect();
                self.keys.set_macro(&format!("F{}", num), &text);
            }
            S::Let(var, expr) => {
                let val = self.eval(&expr)?;
                self.store(&var, val)?;
            }
            S::List(from, to) => {
                let text = self.program.list(from, to)?;
                self.put(&text);
            }
            S::Load(path, run) => {
                let path = self.string(&path)?;
                self.request_load(path, LoadKind::Load { run });
            }
            S::Locate(args) => {
                self.optional_integers(&args)?;
            }
            S::Merge(path) => {
                let path = self.string(&path)?;
                self.request_load(path, LoadKind::Merge);
            }
            S::New => self.new_program(),
            S::Next(idents) => self.next(&idents)?,
            S::OnErrorGoto(0) => {
                self.settings.on_error = None;
                if self.state == State::Trapped {
                    self.state = State::Running;
                    let error = Error::from_code(self.settings.err);
                    return Err(match self.settings.erl {
                        Some(_) => error.in_line_number(self.settings.erl),
                        None => error,
                    });
                }
            }
            S::OnErrorGoto(n) => {
                self.program.start(n)?;
                self.settings.on_error = Some(n);
            }
            S::OnGoto(expr, lines) => {
                if let Some(n) = self.on_target(&expr, &lines)? {
                    self.goto(n)?;
                }
            }
            S::OnGosub(expr, lines) => {
                if let Some(n) = self.on_target(&expr, &lines)? {
                    self.gosub(n)?;
                }
            }
            S::Palette(args) => {
                let args = self.optional_integers(&args)?;
                match args.as_slice() {
                    [] => self.settings.palette.clear(),
                    [Some(attribute), Some(color)] => {
                        self.settings.palette.insert(*attribute, *color);
                    }
                    _ => return Err(error!(IllegalFuncCall)),
                }
            }
            S::Print(items) => self.r#print(&items)?,
            S::Read(vars) => {
                for var in vars {
                    let val = self.read_datum(&var)?;
                    self.store(&var, val)?;
                }
            }
            S::Restore(line) => self.restore(line)?,
            S::Resume(at) => self.resume(at)?,
            S::Return(line) => self.r#return(line)?,
            S::Run(line) => self.run(line)?,
            S::Screen(args) => {
                let args = self.optional_integers(&args)?;
                self.settings.screen = merge_args(&self.settings.screen, args);
            }
            S::Stop => self.stop(),
            S::Troff => self.settings.tracing = false,
            S::Tron => self.settings.tracing = true,
            S::Wend => self.wend()?,
            S::While(predicate) => self.r#while(&predicate)?,
        }
        Ok(())
    }

    fn request_load(&mut self, path: Rc<str>, kind: LoadKind) {
        info!(path = %path, ?kind, "load requested");
        self.loading = Some(LoadRequest {
            path: path.to_string(),
            kind,
        });
    }

    /// CLEAR: variables, stacks, DATA and the error trap.
    fn clear(&mut self) {
        self.vars.clear();
        self.user_fns.clear();
        self.stack.clear();
        self.data = None;
        self.data_pos = 0;
        self.settings.clear_trap();
        self.settings.restart = None;
        if self.state == State::Trapped {
            self.state = State::Running;
        }
    }

    fn new_program(&mut self) {
        self.program.clear();
        self.clear();
        self.settings = Settings::default();
        self.halt(State::Idle);
    }

    fn run(&mut self, line: Option<u16>) -> Result<()> {
        let start = match line {
            Some(n) => Some(self.program.start(n)?),
            None => self.program.first_line().map(|n| Cursor::new(Some(n))),
        };
        self.clear();
        self.cursor = start;
        self.state = State::Running;
        Ok(())
    }

    fn cont(&mut self) -> Result<()> {
        match self.settings.restart.take() {
            Some(cursor) => {
                self.cursor = Some(cursor);
                self.state = State::Running;
                Ok(())
            }
            None => Err(error!(CantContinue)),
        }
    }

    fn end(&mut self) -> Result<()> {
        if self.state == State::Trapped {
            return Err(error!(NoResume));
        }
        if self.current.line.is_some() {
            self.settings.restart = self.cursor.clone();
        }
        self.halt(State::Stopped);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(n) = self.current.line {
            self.break_message(n);
            self.settings.restart = self.cursor.clone();
        }
        self.halt(State::Stopped);
    }

    fn goto(&mut self, n: u16) -> Result<()> {
        self.cursor = Some(self.program.start(n)?);
        Ok(())
    }

    fn gosub(&mut self, n: u16) -> Result<()> {
        let target = self.program.start(n)?;
        self.stack.push(Frame::Gosub(self.cursor.take()))?;
        self.cursor = Some(target);
        Ok(())
    }

    fn r#return(&mut self, line: Option<u16>) -> Result<()> {
        let pos = self
            .stack
            .rposition(|f| matches!(f, Frame::Gosub(_)))
            .ok_or_else(|| error!(ReturnWoGosub))?;
        self.stack.truncate(pos + 1);
        let ret = match self.stack.pop()? {
            Frame::Gosub(ret) => ret,
            _ => return Err(error!(InternalErr)),
        };
        match line {
            Some(n) => self.goto(n),
            None => {
                self.cursor = ret;
                Ok(())
            }
        }
    }

    fn on_target(&mut self, expr: &Expression, lines: &[u16]) -> Result<Option<u16>> {
        let n = self.integer(expr)?;
        if !(0..=255).contains(&n) {
            return Err(error!(IllegalFuncCall));
        }
        Ok(match n as usize {
            0 => None,
            n => lines.get(n - 1).copied(),
        })
    }

    fn r#for(
        &mut self,
        var: Ident,
        from: &Expression,
        to: &Expression,
        step: Option<&Expression>,
    ) -> Result<()> {
        if var.is_string() {
            return Err(error!(TypeMismatch));
        }
        let from = self.eval(from)?;
        self.vars.store(&var, from)?;
        let to = self.eval(to)?;
        let step = match step {
            Some(expr) => self.eval(expr)?,
            None => Val::Integer(1),
        };
        if to.is_string() || step.is_string() {
            return Err(error!(TypeMismatch));
        }
        let floor = self
            .stack
            .rposition(|f| matches!(f, Frame::Gosub(_)))
            .map_or(0, |p| p + 1);
        if let Some(pos) = self
            .stack
            .rposition(|f| matches!(f, Frame::For { var: v, .. } if *v == var))
        {
            if pos >= floor {
                self.stack.truncate(pos);
            }
        }
        if self.for_finished(&var, &to, &step)? {
            return self.skip_to_next();
        }
        let body = self.cursor.clone();
        self.stack.push(Frame::For {
            var,
            to,
            step,
            body,
        })
    }

    fn for_finished(&self, var: &Ident, to: &Val, step: &Val) -> Result<bool> {
        let value = f64::try_from(self.vars.fetch(var))?;
        let to = f64::try_from(to.clone())?;
        let step = f64::try_from(step.clone())?;
        Ok(if step >= 0.0 { value > to } else { value < to })
    }

    /// A loop that runs zero times continues after its NEXT.
    fn skip_to_next(&mut self) -> Result<()> {
        let mut depth = 0;
        let mut cursor = self.cursor.clone();
        while let Some(c) = cursor {
            match self.program.statement(&c) {
                Some(Statement::For(..)) => depth += 1,
                Some(Statement::Next(idents)) => {
                    let closes = idents.len().max(1);
                    if closes > depth {
                        self.cursor = self.program.advance(&c);
                        return Ok(());
                    }
                    depth -= closes;
                }
                _ => {}
            }
            cursor = self.program.advance(&c);
        }
        Err(error!(ForWoNext))
    }

    fn next(&mut self, idents: &[Ident]) -> Result<()> {
        if idents.is_empty() {
            self.next_one(None)?;
            return Ok(());
        }
        for ident in idents {
            if self.next_one(Some(ident))? {
                break;
            }
        }
        Ok(())
    }

    /// Step one loop. True when jumping back into its body.
    fn next_one(&mut self, ident: Option<&Ident>) -> Result<bool> {
        loop {
            match self.stack.last() {
                Some(Frame::For { var, .. }) if ident.map_or(true, |i| i == var) => break,
                Some(Frame::For { .. }) => {
                    self.stack.pop()?;
                }
                _ => return Err(error!(NextWithoutFor)),
            }
        }
        let (var, to, step, body) = match self.stack.last() {
            Some(Frame::For {
                var,
                to,
                step,
                body,
            }) => (var.clone(), to.clone(), step.clone(), body.clone()),
            _ => return Err(error!(InternalErr)),
        };
        let value = Operation::sum(self.vars.fetch(&var), step.clone())?;
        self.vars.store(&var, value)?;
        if self.for_finished(&var, &to, &step)? {
            self.stack.pop()?;
            Ok(false)
        } else {
            self.cursor = body;
            Ok(true)
        }
    }

    fn r#while(&mut self, predicate: &Expression) -> Result<()> {
        if self.eval(predicate)?.is_true()? {
            return self.stack.push(Frame::While(self.current.clone()));
        }
        let mut depth = 0;
        let mut cursor = self.cursor.clone();
        while let Some(c) = cursor {
            match self.program.statement(&c) {
                Some(Statement::While(_)) => depth += 1,
                Some(Statement::Wend) if depth == 0 => {
                    self.cursor = self.program.advance(&c);
                    return Ok(());
                }
                Some(Statement::Wend) => depth -= 1,
                _ => {}
            }
            cursor = self.program.advance(&c);
        }
        Err(error!(WhileWoWend))
    }

    fn wend(&mut self) -> Result<()> {
        match self.stack.last() {
            Some(Frame::While(_)) => {}
            _ => return Err(error!(WendWoWhile)),
        }
        if let Frame::While(cursor) = self.stack.pop()? {
            self.cursor = Some(cursor);
        }
        Ok(())
    }

    fn resume(&mut self, at: ResumeAt) -> Result<()> {
        if self.state != State::Trapped {
            return Err(error!(ResumeWoError));
        }
        let resume = match self.settings.resume.take() {
            Some(cursor) => cursor,
            None => return Err(error!(ResumeWoError)),
        };
        self.state = State::Running;
        match at {
            ResumeAt::Retry => self.cursor = Some(resume),
            ResumeAt::Next => self.cursor = self.program.advance(&resume),
            ResumeAt::Line(n) => self.goto(n)?,
        }
        Ok(())
    }

    fn read_datum(&mut self, var: &Variable) -> Result<Val> {
        if self.data.is_none() {
            self.data = Some(self.program.data());
        }
        let item = match self.data.as_ref().and_then(|d| d.get(self.data_pos)) {
            Some(item) => item.clone(),
            None => return Err(error!(OutOfData)),
        };
        self.data_pos += 1;
        if var.ident().is_string() {
            return Ok(Val::String(item.text()));
        }
        match &item.datum {
            Datum::Raw(s) if s.trim().is_empty() => Ok(Val::Integer(0)),
            Datum::Raw(s) if is_numeric(s) => Ok(Val::from_numeric_prefix(s)),
            _ => Err(error!(Syntax, Some(item.line))),
        }
    }

    fn restore(&mut self, line: Option<u16>) -> Result<()> {
        self.data_pos = 0;
        if let Some(n) = line {
            self.program.start(n)?;
            if self.data.is_none() {
                self.data = Some(self.program.data());
            }
            if let Some(data) = &self.data {
                self.data_pos = data
                    .iter()
                    .position(|d| d.line >= n)
                    .unwrap_or_else(|| data.len());
            }
        }
        Ok(())
    }

    fn r#print(&mut self, items: &[PrintItem]) -> Result<()> {
        let mut s = String::new();
        for item in items {
            match item {
                PrintItem::Expr(expr) => match self.eval(expr)? {
                    Val::String(text) => s.push_str(&text),
                    val => s.push_str(&format!("{} ", val)),
                },
                PrintItem::Comma => {
                    let column = column_after(self.column, &s);
                    let pad = PRINT_ZONE - column % PRINT_ZONE;
                    s.push_str(&" ".repeat(pad));
                }
                PrintItem::Semicolon => {}
            }
        }
        if !matches!(
            items.last(),
            Some(PrintItem::Comma) | Some(PrintItem::Semicolon)
        ) {
            s.push('\n');
        }
        self.put(&s);
        Ok(())
    }

    fn store(&mut self, var: &Variable, val: Val) -> Result<()> {
        match var {
            Variable::Unary(ident) => self.vars.store(ident, val),
            Variable::Array(ident, subscripts) => {
                let subscripts = self.eval_list(subscripts)?;
                self.vars.store_array(ident, subscripts, val)
            }
        }
    }

    fn eval(&mut self, expr: &Expression) -> Result<Val> {
        use Expression as E;
        Ok(match expr {
            E::Integer(n) => Val::Integer(*n),
            E::Single(n) => Val::Single(*n),
            E::Double(n) => Val::Double(*n),
            E::String(s) => Val::String(s.clone()),
            E::Bool(b) => Val::Integer(if *b { -1 } else { 0 }),
            E::Var(Variable::Unary(ident)) if ident.is_fn() => self.call_user(ident, vec![])?,
            E::Var(Variable::Unary(ident)) => self.vars.fetch(ident),
            E::Var(Variable::Array(ident, subscripts)) => {
                let subscripts = self.eval_list(subscripts)?;
                self.vars.fetch_array(ident, subscripts)?
            }
            E::Call(ident, args) => {
                let args = self.eval_list(args)?;
                if ident.is_fn() {
                    self.call_user(ident, args)?
                } else {
                    self.functions.call(ident.name(), args)?
                }
            }
            E::Unary(op, expr) => {
                let val = self.eval(expr)?;
                Operation::unary(*op, val)?
            }
            E::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                Operation::binary(*op, lhs, rhs)?
            }
            E::Erl => Val::Single(self.settings.erl.unwrap_or(65535) as f32),
            E::Err => Val::Integer(self.settings.err as i16),
            E::Csrlin => Val::Integer(1),
        })
    }

    fn eval_list(&mut self, exprs: &[Expression]) -> Result<Vec<Val>> {
        let mut vals = Vec::with_capacity(exprs.len());
        for expr in exprs {
            vals.push(self.eval(expr)?);
        }
        Ok(vals)
    }

    fn integer(&mut self, expr: &Expression) -> Result<i16> {
        i16::try_from(self.eval(expr)?)
    }

    fn string(&mut self, expr: &Expression) -> Result<Rc<str>> {
        Rc::<str>::try_from(self.eval(expr)?)
    }

    fn optional_integers(&mut self, args: &[Option<Expression>]) -> Result<Vec<Option<i16>>> {
        let mut vals = Vec::with_capacity(args.len());
        for arg in args {
            vals.push(match arg {
                Some(expr) => Some(self.integer(expr)?),
                None => None,
            });
        }
        Ok(vals)
    }

    fn call_user(&mut self, ident: &Ident, args: Vec<Val>) -> Result<Val> {
        let (params, body) = match self.user_fns.get(ident) {
            Some(f) => f.clone(),
            None => return Err(error!(UndefinedFunction)),
        };
        if params.len() != args.len() {
            return Err(error!(Syntax));
        }
        if self.fn_depth >= MAX_FN_DEPTH {
            return Err(error!(OutOfMemory));
        }
        let saved: Vec<Val> = params.iter().map(|p| self.vars.fetch(p)).collect();
        for (param, arg) in params.iter().zip(args) {
            self.vars.store(param, arg)?;
        }
        self.fn_depth += 1;
        let result = self.eval(&body);
        self.fn_depth -= 1;
        for (param, val) in params.iter().zip(saved) {
            self.vars.store(param, val)?;
        }
        let result = result?;
        if ident.is_string() != result.is_string() {
            return Err(error!(TypeMismatch));
        }
        Ok(result)
    }
}

fn column_after(column: usize, s: &str) -> usize {
    match s.rfind('\n') {
        Some(i) => s[i + 1..].chars().count(),
        None => column + s.chars().count(),
    }
}

fn merge_args(old: &[i16], new: Vec<Option<i16>>) -> Vec<i16> {
    new.iter()
        .enumerate()
        .map(|(i, v)| v.or_else(|| old.get(i).copied()).unwrap_or(0))
        .collect()
}

fn is_numeric(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'E' | 'e' | 'D' | 'd' | ' ')
        })
}
