use crate::error;
use crate::lang::ast::{AcceptVisitor, Datum, Ident, Statement, Visitor};
use crate::lang::{parse, tokenized, Error, Line, LineNumber};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, Error>;

/// ## Program store
///
/// Numbered lines in order plus the most recent direct-mode line.

#[derive(Debug, Default, Clone)]
pub struct Program {
    lines: BTreeMap<u16, Vec<Statement>>,
    direct: Vec<Statement>,
    protected: bool,
}

/// Position of a statement.
///
/// `path` starts with the statement index within the line. Statements nested
/// in an IF are addressed by two more entries: the branch (0 for THEN, 1 for
/// ELSE) and the index within that branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub line: LineNumber,
    pub path: Vec<usize>,
}

impl Cursor {
    pub fn new(line: LineNumber) -> Cursor {
        Cursor {
            line,
            path: vec![0],
        }
    }
}

/// A DATA item with the line it was declared on.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub line: u16,
    pub datum: Datum,
}

struct DataCollector<'a> {
    line: u16,
    items: &'a mut Vec<DataItem>,
}

impl<'a> Visitor for DataCollector<'a> {
    fn visit_statement(&mut self, stmt: &Statement) {
        if let Statement::Data(data) = stmt {
            for datum in data {
                self.items.push(DataItem {
                    line: self.line,
                    datum: datum.clone(),
                });
            }
        }
    }
}

struct CommonCollector<'a> {
    idents: &'a mut Vec<Ident>,
}

impl<'a> Visitor for CommonCollector<'a> {
    fn visit_statement(&mut self, stmt: &Statement) {
        if let Statement::Common(idents) = stmt {
            self.idents.extend(idents.iter().cloned());
        }
    }
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    /// Build a program from a file's bytes in any supported format.
    /// Direct statements in the file are reported and skipped.
    pub fn from_bytes(bytes: &[u8]) -> (Program, Vec<Error>) {
        let decoded = tokenized::decode(bytes);
        let protected = decoded.is_protected();
        let tokens = decoded.into_tokens();
        let (lines, mut errors) = parse(&tokens);
        let mut program = Program {
            protected,
            ..Program::default()
        };
        for line in lines {
            if line.is_direct() {
                if !line.is_empty() {
                    errors.push(error!(Syntax; "DIRECT STATEMENT IN FILE"));
                }
                continue;
            }
            program.insert(line);
        }
        info!(
            lines = program.lines.len(),
            statements = program.statement_count(),
            protected,
            "program loaded"
        );
        (program, errors)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.direct.clear();
        self.protected = false;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// Store a numbered line. A line with no statements deletes it.
    pub fn insert(&mut self, line: Line) {
        let number = match line.number() {
            Some(number) => number,
            None => {
                self.direct = line.into_statements();
                return;
            }
        };
        if line.is_empty() {
            if self.lines.remove(&number).is_some() {
                debug!(line = number, "line deleted");
            }
        } else {
            self.lines.insert(number, line.into_statements());
        }
    }

    /// Lines of `other` replace lines with the same number.
    pub fn merge(&mut self, other: Program) {
        self.protected |= other.protected;
        for (number, stmts) in other.lines {
            self.lines.insert(number, stmts);
        }
    }

    pub fn contains(&self, number: u16) -> bool {
        self.lines.contains_key(&number)
    }

    pub fn first_line(&self) -> Option<u16> {
        self.lines.keys().next().copied()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Statements on all numbered lines, not counting those nested in IF.
    pub fn statement_count(&self) -> usize {
        self.lines.values().map(|s| s.len()).sum()
    }

    /// Cursor at the first statement of a line.
    pub fn start(&self, number: u16) -> Result<Cursor> {
        if self.contains(number) {
            Ok(Cursor::new(Some(number)))
        } else {
            Err(error!(UndefinedLineNumber))
        }
    }

    pub fn direct_start(&self) -> Cursor {
        Cursor::new(None)
    }

    fn line_statements(&self, line: LineNumber) -> Option<&Vec<Statement>> {
        match line {
            Some(number) => self.lines.get(&number),
            None => Some(&self.direct),
        }
    }

    /// The statement list containing the cursor's position, and that position.
    fn list_at<'a>(&'a self, cursor: &Cursor) -> Option<(&'a [Statement], usize)> {
        let mut list: &[Statement] = self.line_statements(cursor.line)?;
        let mut path = cursor.path.iter();
        let mut index = *path.next()?;
        while let Some(branch) = path.next() {
            let inner = path.next()?;
            list = match list.get(index)? {
                Statement::If(_, then_stmts, else_stmts) => match *branch {
                    0 => then_stmts.as_slice(),
                    _ => else_stmts.as_slice(),
                },
                _ => return None,
            };
            index = *inner;
        }
        Some((list, index))
    }

    pub fn statement(&self, cursor: &Cursor) -> Option<&Statement> {
        let (list, index) = self.list_at(cursor)?;
        list.get(index)
    }

    /// Move into a branch of the IF under the cursor. Empty branches are not entered.
    pub fn enter_branch(&self, cursor: &Cursor, branch: usize) -> Option<Cursor> {
        if let Some(Statement::If(_, then_stmts, else_stmts)) = self.statement(cursor) {
            let list = if branch == 0 { then_stmts } else { else_stmts };
            if !list.is_empty() {
                let mut path = cursor.path.clone();
                path.push(branch);
                path.push(0);
                return Some(Cursor {
                    line: cursor.line,
                    path,
                });
            }
        }
        None
    }

    /// Next statement in execution order, leaving IF branches and
    /// continuing to following lines. `None` past the end.
    pub fn advance(&self, cursor: &Cursor) -> Option<Cursor> {
        let mut next = cursor.clone();
        loop {
            if let Some(last) = next.path.last_mut() {
                *last += 1;
            }
            if self.statement(&next).is_some() {
                return Some(next);
            }
            if next.path.len() >= 3 {
                next.path.truncate(next.path.len() - 2);
                continue;
            }
            let number = next.line?;
            let (&following, _) = self
                .lines
                .range((std::ops::Bound::Excluded(number), std::ops::Bound::Unbounded))
                .next()?;
            return Some(Cursor::new(Some(following)));
        }
    }

    /// Every DATA item in program order, including those inside IF branches.
    pub fn data(&self) -> Vec<DataItem> {
        let mut items = vec![];
        for (&line, stmts) in &self.lines {
            let mut collector = DataCollector {
                line,
                items: &mut items,
            };
            for stmt in stmts {
                stmt.accept(&mut collector);
            }
        }
        items
    }

    /// Variables named by COMMON statements.
    pub fn common(&self) -> Vec<Ident> {
        let mut idents = vec![];
        let mut collector = CommonCollector {
            idents: &mut idents,
        };
        for stmts in self.lines.values() {
            for stmt in stmts {
                stmt.accept(&mut collector);
            }
        }
        idents
    }

    /// LIST text for the inclusive range.
    pub fn list(&self, from: Option<u16>, to: Option<u16>) -> Result<String> {
        if self.protected {
            return Err(error!(IllegalFuncCall));
        }
        let from = from.unwrap_or(0);
        let to = to.unwrap_or(65529);
        if from > to {
            return Ok(String::new());
        }
        let mut s = String::new();
        for (&number, stmts) in self.lines.range(from..=to) {
            let line = Line::new(Some(number), stmts.clone());
            s.push_str(&line.to_string());
            s.push('\n');
        }
        Ok(s)
    }
}

impl DataItem {
    pub fn text(&self) -> Rc<str> {
        self.datum.text().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::lex;

    fn program(s: &str) -> Program {
        let (lines, errors) = parse(&lex(s));
        assert!(errors.is_empty(), "{:?}", errors);
        let mut program = Program::new();
        for line in lines {
            program.insert(line);
        }
        program
    }

    #[test]
    fn test_insert_replace_delete() {
        let mut p = program("20 END\n10 PRINT 1\n20 STOP\n30 CLS");
        assert_eq!(p.list(None, None).unwrap(), "10 PRINT 1\n20 STOP\n30 CLS\n");
        p.insert(Line::new(Some(20), vec![]));
        assert_eq!(p.line_count(), 2);
        assert_eq!(p.list(Some(30), None).unwrap(), "30 CLS\n");
    }

    #[test]
    fn test_advance_through_branches() {
        let p = program("10 IF 1 THEN A=1:B=2 ELSE C=3\n20 END");
        let start = p.start(10).unwrap();
        let then = p.enter_branch(&start, 0).unwrap();
        assert_eq!(then.path, vec![0, 0, 0]);
        let second = p.advance(&then).unwrap();
        assert_eq!(second.path, vec![0, 0, 1]);
        let after = p.advance(&second).unwrap();
        assert_eq!(after, Cursor::new(Some(20)));
        assert_eq!(p.advance(&after), None);
    }

    #[test]
    fn test_start_missing_line() {
        let p = program("10 END");
        assert!(p
            .start(20)
            .unwrap_err()
            .is(crate::lang::ErrorCode::UndefinedLineNumber));
    }

    #[test]
    fn test_data_in_order() {
        let p = program("30 DATA 3\n10 DATA 1,\"TWO\"\n20 IF 0 THEN DATA 2.5");
        let data: Vec<_> = p.data().iter().map(|d| (d.line, d.text())).collect();
        assert_eq!(
            data,
            vec![
                (10, "1".into()),
                (10, "TWO".into()),
                (20, "2.5".into()),
                (30, "3".into())
            ]
        );
    }

    #[test]
    fn test_merge() {
        let mut p = program("10 A=1\n20 B=2");
        p.merge(program("20 B=3\n30 C=4"));
        assert_eq!(p.list(None, None).unwrap(), "10 A = 1\n20 B = 3\n30 C = 4\n");
    }

    #[test]
    fn test_common() {
        let p = program("10 COMMON A, B$\n20 END");
        assert_eq!(p.common(), vec![Ident::from("A"), Ident::from("B$")]);
    }

    #[test]
    fn test_ascii_file() {
        let src = b"10 PRINT \"This is the Start program.\"\r\n20 PRINT \"Saved as ASCII.\"\r\n\x1a";
        let (p, errors) = Program::from_bytes(src);
        assert!(errors.is_empty());
        assert_eq!(p.statement_count(), 2);
        assert!(!p.is_protected());
    }
}
