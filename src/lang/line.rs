use super::ast::Statement;
use super::LineNumber;

/// A parsed source line. Lines without a number are direct-mode input.
#[derive(Debug, PartialEq, Clone)]
pub struct Line {
    number: LineNumber,
    statements: Vec<Statement>,
}

impl Line {
    pub fn new(number: LineNumber, statements: Vec<Statement>) -> Line {
        Line { number, statements }
    }

    pub fn number(&self) -> LineNumber {
        self.number
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn is_direct(&self) -> bool {
        self.number.is_none()
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = self
            .statements
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" : ");
        match self.number {
            Some(number) if s.is_empty() => write!(f, "{}", number),
            Some(number) => write!(f, "{} {}", number, s),
            None => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let line = Line::new(Some(10), vec![Statement::Cls, Statement::Goto(10)]);
        assert_eq!(line.to_string(), "10 CLS : GOTO 10");
        assert_eq!(Line::new(Some(20), vec![]).to_string(), "20");
        assert_eq!(Line::new(None, vec![Statement::New]).to_string(), "NEW");
    }
}
