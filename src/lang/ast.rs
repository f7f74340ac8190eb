use std::fmt;
use std::rc::Rc;

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Auto(Option<u16>, Option<u16>),
    Beep,
    Chain(Expression, Option<u16>, bool),
    Clear(Vec<Option<Expression>>),
    Cls,
    Color(Vec<Option<Expression>>),
    Common(Vec<Ident>),
    Cont,
    Data(Vec<Datum>),
    Def(Ident, Vec<Ident>, Expression),
    Dim(Vec<Variable>),
    End,
    Error(Expression),
    Files(Option<Expression>),
    For(Ident, Expression, Expression, Option<Expression>),
    Gosub(u16),
    Goto(u16),
    If(Expression, Vec<Statement>, Vec<Statement>),
    Key(Expression, Expression),
    Let(Variable, Expression),
    List(Option<u16>, Option<u16>),
    Load(Expression, bool),
    Locate(Vec<Option<Expression>>),
    Merge(Expression),
    New,
    Next(Vec<Ident>),
    OnErrorGoto(u16),
    OnGoto(Expression, Vec<u16>),
    OnGosub(Expression, Vec<u16>),
    Palette(Vec<Option<Expression>>),
    Print(Vec<PrintItem>),
    Read(Vec<Variable>),
    Rem(Rc<str>),
    Restore(Option<u16>),
    Resume(ResumeAt),
    Return(Option<u16>),
    Run(Option<u16>),
    Screen(Vec<Option<Expression>>),
    Stop,
    Troff,
    Tron,
    Wend,
    While(Expression),
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ResumeAt {
    Retry,
    Next,
    Line(u16),
}

#[derive(Debug, PartialEq, Clone)]
pub enum PrintItem {
    Expr(Expression),
    Comma,
    Semicolon,
}

/// One DATA item, kept as text until a READ decides its type.
#[derive(Debug, PartialEq, Clone)]
pub enum Datum {
    Quoted(Rc<str>),
    Raw(Rc<str>),
}

impl Datum {
    pub fn text(&self) -> &str {
        match self {
            Datum::Quoted(s) | Datum::Raw(s) => s,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum Ident {
    Plain(Rc<str>),
    String(Rc<str>),
    Single(Rc<str>),
    Double(Rc<str>),
    Integer(Rc<str>),
}

impl Ident {
    pub fn name(&self) -> &str {
        use Ident::*;
        match self {
            Plain(s) | String(s) | Single(s) | Double(s) | Integer(s) => s,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Ident::String(_))
    }

    pub fn is_fn(&self) -> bool {
        self.name().starts_with("FN")
    }
}

impl From<&str> for Ident {
    fn from(s: &str) -> Ident {
        let s = s.to_ascii_uppercase();
        match s.chars().last() {
            Some('$') => Ident::String(s.into()),
            Some('!') => Ident::Single(s.into()),
            Some('#') => Ident::Double(s.into()),
            Some('%') => Ident::Integer(s.into()),
            _ => Ident::Plain(s.into()),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Variable {
    Unary(Ident),
    Array(Ident, Vec<Expression>),
}

impl Variable {
    pub fn ident(&self) -> &Ident {
        match self {
            Variable::Unary(ident) | Variable::Array(ident, _) => ident,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Integer(i16),
    Single(f32),
    Double(f64),
    String(Rc<str>),
    Bool(bool),
    Var(Variable),
    Call(Ident, Vec<Expression>),
    Unary(Operator, Box<Expression>),
    Binary(Operator, Box<Expression>, Box<Expression>),
    Erl,
    Err,
    Csrlin,
}

/// Built-in functions. Any other `NAME(...)` is an array element.
pub const FUNCTIONS: &[&str] = &[
    "ABS", "ASC", "CHR$", "COS", "INT", "LEFT$", "LEN", "MID$", "RIGHT$", "RND", "SGN", "SIN",
    "SQR", "STR$", "VAL",
];

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
    Imp,
    Eqv,
    Xor,
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Modulus,
    DivideInt,
    Multiply,
    Divide,
    Power,
    Negate,
    Positive,
    Not,
}

/// Binding strength, loosest first.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Precedence {
    Lowest,
    Imp,
    Eqv,
    Xor,
    Or,
    And,
    Relational,
    Sum,
    Modulus,
    DivideInt,
    Product,
    Prefix,
    Power,
    Atom,
}

impl Operator {
    pub fn precedence(self) -> Precedence {
        use Operator::*;
        match self {
            Imp => Precedence::Imp,
            Eqv => Precedence::Eqv,
            Xor => Precedence::Xor,
            Or => Precedence::Or,
            And => Precedence::And,
            Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual => Precedence::Relational,
            Add | Subtract => Precedence::Sum,
            Modulus => Precedence::Modulus,
            DivideInt => Precedence::DivideInt,
            Multiply | Divide => Precedence::Product,
            Negate | Positive | Not => Precedence::Prefix,
            Power => Precedence::Power,
        }
    }
}

impl Expression {
    fn precedence(&self) -> Precedence {
        match self {
            Expression::Unary(op, _) | Expression::Binary(op, _, _) => op.precedence(),
            _ => Precedence::Atom,
        }
    }
}

pub trait Visitor {
    fn visit_statement(&mut self, _: &Statement) {}
    fn visit_variable(&mut self, _: &Variable) {}
    fn visit_expression(&mut self, _: &Expression) {}
}

pub trait AcceptVisitor {
    fn accept<V: Visitor>(&self, visitor: &mut V);
}

impl AcceptVisitor for Variable {
    fn accept<V: Visitor>(&self, visitor: &mut V) {
        if let Variable::Array(_, vec_expr) = self {
            for expr in vec_expr {
                expr.accept(visitor);
            }
        }
        visitor.visit_variable(self)
    }
}

impl AcceptVisitor for Expression {
    fn accept<V: Visitor>(&self, visitor: &mut V) {
        use Expression::*;
        match self {
            Integer(_) | Single(_) | Double(_) | String(_) | Bool(_) | Erl | Err | Csrlin => {}
            Var(var) => var.accept(visitor),
            Call(_, vec_expr) => {
                for expr in vec_expr {
                    expr.accept(visitor);
                }
            }
            Unary(_, expr) => expr.accept(visitor),
            Binary(_, expr1, expr2) => {
                expr1.accept(visitor);
                expr2.accept(visitor);
            }
        }
        visitor.visit_expression(self)
    }
}

impl AcceptVisitor for Statement {
    fn accept<V: Visitor>(&self, visitor: &mut V) {
        use Statement::*;
        fn each<V: Visitor>(visitor: &mut V, list: &[Option<Expression>]) {
            for expr in list.iter().flatten() {
                expr.accept(visitor);
            }
        }
        match self {
            Auto(..) | Beep | Cls | Common(_) | Cont | Data(_) | End | Gosub(_) | Goto(_)
            | List(..) | New | Next(_) | OnErrorGoto(_) | Rem(_) | Restore(_) | Resume(_)
            | Return(_) | Run(_) | Stop | Troff | Tron | Wend => {}
            Chain(expr, ..) | Error(expr) | Load(expr, _) | Merge(expr) | While(expr) => {
                expr.accept(visitor)
            }
            Clear(list) | Color(list) | Locate(list) | Palette(list) | Screen(list) => {
                each(visitor, list)
            }
            Def(_, _, expr) => expr.accept(visitor),
            Dim(vars) | Read(vars) => {
                for var in vars {
                    var.accept(visitor);
                }
            }
            Files(expr) => {
                if let Some(expr) = expr {
                    expr.accept(visitor);
                }
            }
            For(_, from, to, step) => {
                from.accept(visitor);
                to.accept(visitor);
                if let Some(step) = step {
                    step.accept(visitor);
                }
            }
            If(predicate, then_stmts, else_stmts) => {
                predicate.accept(visitor);
                for stmt in then_stmts.iter().chain(else_stmts.iter()) {
                    stmt.accept(visitor);
                }
            }
            Key(expr1, expr2) => {
                expr1.accept(visitor);
                expr2.accept(visitor);
            }
            Let(var, expr) => {
                var.accept(visitor);
                expr.accept(visitor);
            }
            OnGoto(expr, _) | OnGosub(expr, _) => expr.accept(visitor),
            Print(items) => {
                for item in items {
                    if let PrintItem::Expr(expr) = item {
                        expr.accept(visitor);
                    }
                }
            }
        }
        visitor.visit_statement(self)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variable::Unary(ident) => write!(f, "{}", ident),
            Variable::Array(ident, subs) => write!(f, "{}({})", ident, join(subs, ", ")),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Operator::*;
        let s = match self {
            Imp => "IMP",
            Eqv => "EQV",
            Xor => "XOR",
            Or => "OR",
            And => "AND",
            Equal => "=",
            NotEqual => "<>",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
            Add | Positive => "+",
            Subtract | Negate => "-",
            Modulus => "MOD",
            DivideInt => "\\",
            Multiply => "*",
            Divide => "/",
            Power => "^",
            Not => "NOT",
        };
        write!(f, "{}", s)
    }
}

fn single_literal(n: f32) -> String {
    let s = format!("{}", n);
    let digits = s.trim_start_matches(|c| c == '0' || c == '.').len();
    if s.contains('.') && digits <= 7 {
        s
    } else {
        format!("{}!", s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Expression::*;
        match self {
            Integer(n) if *n < 0 => write!(f, "&H{:X}", *n as u16),
            Integer(n) => write!(f, "{}", n),
            Single(n) => write!(f, "{}", single_literal(*n)),
            Double(n) => write!(f, "{}#", n),
            String(s) => write!(f, "\"{}\"", s),
            Bool(true) => write!(f, "TRUE"),
            Bool(false) => write!(f, "FALSE"),
            Var(var) => write!(f, "{}", var),
            Call(ident, args) => write!(f, "{}({})", ident, join(args, ", ")),
            Erl => write!(f, "ERL"),
            Err => write!(f, "ERR"),
            Csrlin => write!(f, "CSRLIN"),
            Unary(op, expr) => {
                let space = if *op == Operator::Not { " " } else { "" };
                if expr.precedence() < op.precedence() {
                    write!(f, "{}{}({})", op, space, expr)
                } else {
                    write!(f, "{}{}{}", op, space, expr)
                }
            }
            Binary(op, lhs, rhs) => {
                let prec = op.precedence();
                if lhs.precedence() < prec {
                    write!(f, "({})", lhs)?;
                } else {
                    write!(f, "{}", lhs)?;
                }
                write!(f, " {} ", op)?;
                if rhs.precedence() <= prec {
                    write!(f, "({})", rhs)
                } else {
                    write!(f, "{}", rhs)
                }
            }
        }
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

fn join_elided(items: &[Option<Expression>]) -> String {
    items
        .iter()
        .map(|item| match item {
            Some(expr) => expr.to_string(),
            None => std::string::String::new(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn with_args(f: &mut fmt::Formatter, word: &str, args: &str) -> fmt::Result {
    if args.is_empty() {
        write!(f, "{}", word)
    } else {
        write!(f, "{} {}", word, args)
    }
}

fn branch(stmts: &[Statement]) -> String {
    match stmts {
        [Statement::Goto(n)] => n.to_string(),
        _ => join(stmts, " : "),
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Statement::*;
        match self {
            Auto(start, step) => {
                let mut s = start.map(|n| n.to_string()).unwrap_or_default();
                if let Some(step) = step {
                    s.push_str(&format!(", {}", step));
                }
                with_args(f, "AUTO", &s)
            }
            Beep => write!(f, "BEEP"),
            Chain(path, line, all) => {
                write!(f, "CHAIN {}", path)?;
                if let Some(line) = line {
                    write!(f, ", {}", line)?;
                }
                if *all {
                    if line.is_none() {
                        write!(f, ",")?;
                    }
                    write!(f, ", ALL")?;
                }
                Ok(())
            }
            Clear(args) => with_args(f, "CLEAR", &join_elided(args)),
            Cls => write!(f, "CLS"),
            Color(args) => with_args(f, "COLOR", &join_elided(args)),
            Common(idents) => write!(f, "COMMON {}", join(idents, ", ")),
            Cont => write!(f, "CONT"),
            Data(items) => {
                let items: Vec<std::string::String> = items
                    .iter()
                    .map(|item| match item {
                        Datum::Quoted(s) => format!("\"{}\"", s),
                        Datum::Raw(s) => s.to_string(),
                    })
                    .collect();
                write!(f, "DATA {}", items.join(","))
            }
            Def(ident, params, expr) => {
                if params.is_empty() {
                    write!(f, "DEF {} = {}", ident, expr)
                } else {
                    write!(f, "DEF {}({}) = {}", ident, join(params, ", "), expr)
                }
            }
            Dim(vars) => write!(f, "DIM {}", join(vars, ", ")),
            End => write!(f, "END"),
            Error(expr) => write!(f, "ERROR {}", expr),
            Files(None) => write!(f, "FILES"),
            Files(Some(expr)) => write!(f, "FILES {}", expr),
            For(ident, from, to, step) => {
                write!(f, "FOR {} = {} TO {}", ident, from, to)?;
                if let Some(step) = step {
                    write!(f, " STEP {}", step)?;
                }
                Ok(())
            }
            Gosub(n) => write!(f, "GOSUB {}", n),
            Goto(n) => write!(f, "GOTO {}", n),
            If(predicate, then_stmts, else_stmts) => {
                write!(f, "IF {} THEN {}", predicate, branch(then_stmts))?;
                if !else_stmts.is_empty() {
                    write!(f, " ELSE {}", branch(else_stmts))?;
                }
                Ok(())
            }
            Key(num, text) => write!(f, "KEY {}, {}", num, text),
            Let(var, expr) => write!(f, "{} = {}", var, expr),
            List(from, to) => match (from, to) {
                (None, None) => write!(f, "LIST"),
                (Some(a), Some(b)) if a == b => write!(f, "LIST {}", a),
                (Some(a), Some(b)) => write!(f, "LIST {}-{}", a, b),
                (Some(a), None) => write!(f, "LIST {}-", a),
                (None, Some(b)) => write!(f, "LIST -{}", b),
            },
            Load(path, true) => write!(f, "RUN {}", path),
            Load(path, false) => write!(f, "LOAD {}", path),
            Locate(args) => with_args(f, "LOCATE", &join_elided(args)),
            Merge(path) => write!(f, "MERGE {}", path),
            New => write!(f, "NEW"),
            Next(idents) => with_args(f, "NEXT", &join(idents, ", ")),
            OnErrorGoto(n) => write!(f, "ON ERROR GOTO {}", n),
            OnGoto(expr, lines) => write!(f, "ON {} GOTO {}", expr, join(lines, ", ")),
            OnGosub(expr, lines) => write!(f, "ON {} GOSUB {}", expr, join(lines, ", ")),
            Palette(args) => with_args(f, "PALETTE", &join_elided(args)),
            Print(items) => {
                write!(f, "PRINT")?;
                for (i, item) in items.iter().enumerate() {
                    match item {
                        PrintItem::Expr(expr) => {
                            let after_expr =
                                i > 0 && matches!(items[i - 1], PrintItem::Expr(_));
                            if after_expr {
                                write!(f, ";")?;
                            }
                            write!(f, " {}", expr)?
                        }
                        PrintItem::Comma => write!(f, ",")?,
                        PrintItem::Semicolon => write!(f, ";")?,
                    }
                }
                Ok(())
            }
            Read(vars) => write!(f, "READ {}", join(vars, ", ")),
            Rem(text) => write!(f, "REM{}", text),
            Restore(None) => write!(f, "RESTORE"),
            Restore(Some(n)) => write!(f, "RESTORE {}", n),
            Resume(ResumeAt::Retry) => write!(f, "RESUME"),
            Resume(ResumeAt::Next) => write!(f, "RESUME NEXT"),
            Resume(ResumeAt::Line(n)) => write!(f, "RESUME {}", n),
            Return(None) => write!(f, "RETURN"),
            Return(Some(n)) => write!(f, "RETURN {}", n),
            Run(None) => write!(f, "RUN"),
            Run(Some(n)) => write!(f, "RUN {}", n),
            Screen(args) => with_args(f, "SCREEN", &join_elided(args)),
            Stop => write!(f, "STOP"),
            Troff => write!(f, "TROFF"),
            Tron => write!(f, "TRON"),
            Wend => write!(f, "WEND"),
            While(expr) => write!(f, "WHILE {}", expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i16) -> Box<Expression> {
        Box::new(Expression::Integer(n))
    }

    #[test]
    fn test_ident_sigils() {
        assert_eq!(Ident::from("a$"), Ident::String("A$".into()));
        assert_eq!(Ident::from("Count%"), Ident::Integer("COUNT%".into()));
        assert_eq!(Ident::from("x"), Ident::Plain("X".into()));
        assert!(Ident::from("fnA").is_fn());
    }

    #[test]
    fn test_display_parenthesizes_by_precedence() {
        let sum = Expression::Binary(Operator::Add, int(1), int(2));
        let product = Expression::Binary(Operator::Multiply, Box::new(sum), int(3));
        assert_eq!(product.to_string(), "(1 + 2) * 3");
        let diff = Expression::Binary(
            Operator::Subtract,
            int(1),
            Box::new(Expression::Binary(Operator::Subtract, int(2), int(3))),
        );
        assert_eq!(diff.to_string(), "1 - (2 - 3)");
        let neg = Expression::Unary(
            Operator::Negate,
            Box::new(Expression::Binary(Operator::Power, int(2), int(2))),
        );
        assert_eq!(neg.to_string(), "-2 ^ 2");
    }

    #[test]
    fn test_display_literals() {
        assert_eq!(Expression::Single(1.5).to_string(), "1.5");
        assert_eq!(Expression::Single(2.0).to_string(), "2!");
        assert_eq!(Expression::Double(2.5).to_string(), "2.5#");
    }

    #[test]
    fn test_display_statements() {
        let stmt = Statement::If(
            Expression::Var(Variable::Unary(Ident::from("A"))),
            vec![Statement::Goto(100)],
            vec![Statement::Print(vec![PrintItem::Expr(Expression::String("X".into()))])],
        );
        assert_eq!(stmt.to_string(), "IF A THEN 100 ELSE PRINT \"X\"");
        let stmt = Statement::Locate(vec![None, Some(Expression::Integer(5))]);
        assert_eq!(stmt.to_string(), "LOCATE , 5");
    }

    struct DataCounter(usize);

    impl Visitor for DataCounter {
        fn visit_statement(&mut self, stmt: &Statement) {
            if let Statement::Data(items) = stmt {
                self.0 += items.len();
            }
        }
    }

    #[test]
    fn test_visitor_reaches_nested_statements() {
        let stmt = Statement::If(
            Expression::Bool(true),
            vec![Statement::Data(vec![Datum::Raw("1".into())])],
            vec![Statement::Data(vec![
                Datum::Raw("2".into()),
                Datum::Quoted("3".into()),
            ])],
        );
        let mut counter = DataCounter(0);
        stmt.accept(&mut counter);
        assert_eq!(counter.0, 3);
    }
}
