use super::ast::*;
use super::token::{Token, TokenType};
use super::{Error, Line, LineNumber, MaxValue};

type Result<T> = std::result::Result<T, Error>;

static EOF: Token = Token {
    kind: TokenType::Eof,
    literal: String::new(),
};

/// Parses a whole token stream into lines.
///
/// A line that fails to parse is dropped and its error, tagged with the
/// line number, is collected. Parsing continues with the next line.
pub fn parse(tokens: &[Token]) -> (Vec<Line>, Vec<Error>) {
    let mut parser = Parser {
        tokens,
        pos: 0,
        line_number: None,
    };
    let mut lines = vec![];
    let mut errors = vec![];
    while parser.peek_kind() != TokenType::Eof {
        match parser.line() {
            Ok(Some(line)) => lines.push(line),
            Ok(None) => {}
            Err(e) => {
                errors.push(e.in_line_number(parser.line_number));
                parser.skip_line();
            }
        }
    }
    (lines, errors)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    line_number: LineNumber,
}

impl<'a> Parser<'a> {
    fn line(&mut self) -> Result<Option<Line>> {
        self.line_number = None;
        if self.peek_kind() == TokenType::LineNum {
            let literal = &self.next().literal;
            self.line_number = Some(line_label(literal)?);
        }
        let mut statements = vec![];
        loop {
            match self.peek_kind() {
                TokenType::Eol => {
                    self.pos += 1;
                    break;
                }
                TokenType::Eof => break,
                TokenType::Colon => {
                    self.next();
                    continue;
                }
                _ => {}
            }
            statements.push(self.statement()?);
            if !self.peek_kind().is_terminator() {
                return Err(error!(Syntax; "EXPECTED END OF STATEMENT"));
            }
        }
        if self.line_number.is_none() && statements.is_empty() {
            return Ok(None);
        }
        Ok(Some(Line::new(self.line_number, statements)))
    }

    fn skip_line(&mut self) {
        loop {
            match self.peek_kind() {
                TokenType::Eol => {
                    self.pos += 1;
                    return;
                }
                TokenType::Eof => return,
                _ => self.pos += 1,
            }
        }
    }

    fn peek(&self) -> &'a Token {
        self.tokens.get(self.pos).unwrap_or(&EOF)
    }

    fn peek_kind(&self) -> TokenType {
        self.peek().kind
    }

    fn peek_at(&self, offset: usize) -> TokenType {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenType::Eof, |t| t.kind)
    }

    /// Never moves past the end of the current line.
    fn next(&mut self) -> &'a Token {
        let token = self.peek();
        if !matches!(token.kind, TokenType::Eol | TokenType::Eof) {
            self.pos += 1;
        }
        token
    }

    fn at_end_of_statement(&self) -> bool {
        let kind = self.peek_kind();
        kind.is_terminator() || kind == TokenType::Else
    }

    fn maybe(&mut self, kind: TokenType) -> bool {
        if self.peek_kind() == kind {
            self.next();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenType) -> Result<()> {
        if self.next().kind == kind {
            return Ok(());
        }
        use TokenType as T;
        Err(error!(Syntax;
            match kind {
                T::Ident => "EXPECTED IDENTIFIER",
                T::LParen => "EXPECTED LEFT PARENTHESIS",
                T::RParen => "EXPECTED RIGHT PARENTHESIS",
                T::Comma => "EXPECTED COMMA",
                T::Eq => "EXPECTED EQUALS SIGN",
                T::To => "EXPECTED TO",
                T::Goto => "EXPECTED GOTO",
                _ => "UNEXPECTED TOKEN",
            }
        ))
    }

    fn statement(&mut self) -> Result<Statement> {
        if self.peek_kind() == TokenType::Ident {
            return Statement::r#let(self);
        }
        let token = self.next();
        Statement::for_token(self, token)
    }

    fn expression(&mut self) -> Result<Expression> {
        self.expression_with(Precedence::Lowest)
    }

    fn expression_with(&mut self, precedence: Precedence) -> Result<Expression> {
        let mut lhs = self.prefix()?;
        while let Some(op) = binary_operator(self.peek_kind()) {
            if op.precedence() <= precedence {
                break;
            }
            self.next();
            let rhs = self.expression_with(op.precedence())?;
            lhs = Expression::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self, op: Operator) -> Result<Expression> {
        let expr = self.expression_with(Precedence::Prefix)?;
        Ok(Expression::Unary(op, Box::new(expr)))
    }

    fn prefix(&mut self) -> Result<Expression> {
        use TokenType as T;
        let token = self.next();
        match token.kind {
            T::Minus => self.unary(Operator::Negate),
            T::Plus => self.unary(Operator::Positive),
            T::Not => self.unary(Operator::Not),
            T::LParen => {
                let expr = self.expression()?;
                self.expect(T::RParen)?;
                Ok(expr)
            }
            T::Int | T::Fixed | T::Float | T::Double | T::Hex | T::Octal => number(token),
            T::String => Ok(Expression::String(token.literal.as_str().into())),
            T::Ident => self.ident_expression(&token.literal),
            T::Erl => Ok(Expression::Erl),
            T::Err => Ok(Expression::Err),
            T::Csrlin => Ok(Expression::Csrlin),
            T::True => Ok(Expression::Bool(true)),
            T::False => Ok(Expression::Bool(false)),
            T::Illegal if token.literal.starts_with('"') => {
                Err(error!(Syntax; "UNTERMINATED STRING"))
            }
            T::Eol | T::Eof | T::Colon | T::Else => {
                Err(error!(MissingOp; "EXPECTED EXPRESSION"))
            }
            _ => Err(error!(Syntax; "EXPECTED EXPRESSION")),
        }
    }

    fn ident_expression(&mut self, literal: &str) -> Result<Expression> {
        let mut ident = Ident::from(literal);
        if ident.name() == "FN" && self.peek_kind() == TokenType::Ident {
            let name = format!("FN{}", self.next().literal);
            ident = Ident::from(name.as_str());
        }
        if self.peek_kind() == TokenType::LParen {
            let args = self.paren_list()?;
            if ident.is_fn() || FUNCTIONS.contains(&ident.name()) {
                return Ok(Expression::Call(ident, args));
            }
            return Ok(Expression::Var(Variable::Array(ident, args)));
        }
        if ident.is_fn() {
            return Ok(Expression::Call(ident, vec![]));
        }
        Ok(Expression::Var(Variable::Unary(ident)))
    }

    fn paren_list(&mut self) -> Result<Vec<Expression>> {
        self.expect(TokenType::LParen)?;
        let mut list = vec![];
        loop {
            list.push(self.expression()?);
            match self.next().kind {
                TokenType::RParen => return Ok(list),
                TokenType::Comma => continue,
                _ => return Err(error!(Syntax; "EXPECTED END OR SEPARATOR")),
            }
        }
    }

    /// Positional arguments where any position may be left empty, as in `LOCATE ,5`.
    fn comma_list(&mut self) -> Result<Vec<Option<Expression>>> {
        let mut list = vec![];
        if self.at_end_of_statement() {
            return Ok(list);
        }
        loop {
            if self.peek_kind() == TokenType::Comma {
                list.push(None);
            } else {
                list.push(Some(self.expression()?));
                if self.peek_kind() != TokenType::Comma {
                    return Ok(list);
                }
            }
            self.next();
            if self.at_end_of_statement() {
                return Err(error!(Syntax; "TRAILING COMMA"));
            }
        }
    }

    fn ident(&mut self) -> Result<Ident> {
        let token = self.next();
        if token.kind != TokenType::Ident {
            return Err(error!(Syntax; "EXPECTED IDENTIFIER"));
        }
        Ok(Ident::from(token.literal.as_str()))
    }

    fn ident_list(&mut self) -> Result<Vec<Ident>> {
        let mut list = vec![self.ident()?];
        while self.maybe(TokenType::Comma) {
            list.push(self.ident()?);
        }
        Ok(list)
    }

    fn variable(&mut self) -> Result<Variable> {
        let ident = self.ident()?;
        if self.peek_kind() == TokenType::LParen {
            return Ok(Variable::Array(ident, self.paren_list()?));
        }
        Ok(Variable::Unary(ident))
    }

    fn variable_list(&mut self) -> Result<Vec<Variable>> {
        let mut list = vec![self.variable()?];
        while self.maybe(TokenType::Comma) {
            list.push(self.variable()?);
        }
        Ok(list)
    }

    fn at_line_ref(&self) -> bool {
        self.peek_kind().is_number()
    }

    fn line_ref(&mut self) -> Result<u16> {
        let token = self.next();
        if !token.kind.is_number() {
            return Err(error!(Syntax; "EXPECTED LINE NUMBER"));
        }
        line_label(&token.literal)
    }

    fn line_ref_list(&mut self) -> Result<Vec<u16>> {
        let mut list = vec![self.line_ref()?];
        while self.maybe(TokenType::Comma) {
            list.push(self.line_ref()?);
        }
        Ok(list)
    }

    fn optional_line_ref(&mut self) -> Result<Option<u16>> {
        if self.at_line_ref() {
            return Ok(Some(self.line_ref()?));
        }
        Ok(None)
    }

    /// Statements of a THEN or ELSE branch, up to ELSE or end of line.
    fn branch(&mut self) -> Result<Vec<Statement>> {
        if self.at_line_ref() {
            return Ok(vec![Statement::Goto(self.line_ref()?)]);
        }
        let mut stmts = vec![];
        loop {
            match self.peek_kind() {
                TokenType::Eol | TokenType::Eof | TokenType::Else => break,
                TokenType::Colon => {
                    if self.peek_at(1) == TokenType::Else {
                        break;
                    }
                    self.next();
                    continue;
                }
                _ => {}
            }
            stmts.push(self.statement()?);
            if !self.at_end_of_statement() {
                return Err(error!(Syntax; "EXPECTED END OF STATEMENT"));
            }
        }
        if stmts.is_empty() {
            return Err(error!(Syntax; "EXPECTED STATEMENT"));
        }
        Ok(stmts)
    }
}

fn line_label(literal: &str) -> Result<u16> {
    if literal.is_empty() || !literal.chars().all(|c| c.is_ascii_digit()) {
        return Err(error!(Syntax; "EXPECTED LINE NUMBER"));
    }
    match literal.parse::<u32>() {
        Ok(n) if n <= LineNumber::max_value() as u32 => Ok(n as u16),
        _ => Err(error!(Syntax; "LINE NUMBER OUT OF RANGE")),
    }
}

fn binary_operator(kind: TokenType) -> Option<Operator> {
    use TokenType::*;
    Some(match kind {
        Imp => Operator::Imp,
        Eqv => Operator::Eqv,
        Xor => Operator::Xor,
        Or => Operator::Or,
        And => Operator::And,
        Eq => Operator::Equal,
        NotEq => Operator::NotEqual,
        Lt => Operator::Less,
        Lte => Operator::LessEqual,
        Gt => Operator::Greater,
        Gte => Operator::GreaterEqual,
        Plus => Operator::Add,
        Minus => Operator::Subtract,
        Mod => Operator::Modulus,
        BSlash => Operator::DivideInt,
        Asterisk => Operator::Multiply,
        Slash => Operator::Divide,
        Caret => Operator::Power,
        _ => return None,
    })
}

fn number(token: &Token) -> Result<Expression> {
    let literal = token.literal.as_str();
    let clean = literal
        .trim_end_matches(|c| c == '!' || c == '#' || c == '%')
        .replace(|c| c == 'D' || c == 'd', "E");
    let radix = |digits: &str, radix: u32| -> Result<Expression> {
        match u32::from_str_radix(digits, radix) {
            Ok(n) if n <= 0xFFFF => Ok(Expression::Integer(n as u16 as i16)),
            _ => Err(error!(Overflow)),
        }
    };
    let single = |s: &str| -> Result<Expression> {
        match s.parse::<f32>() {
            Ok(n) if n.is_finite() => Ok(Expression::Single(n)),
            Ok(_) => Err(error!(Overflow)),
            Err(_) => Err(error!(Syntax; "MALFORMED NUMBER")),
        }
    };
    let double = |s: &str| -> Result<Expression> {
        match s.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Expression::Double(n)),
            Ok(_) => Err(error!(Overflow)),
            Err(_) => Err(error!(Syntax; "MALFORMED NUMBER")),
        }
    };
    match token.kind {
        TokenType::Int => clean
            .parse::<i16>()
            .map(Expression::Integer)
            .map_err(|_| error!(Overflow)),
        TokenType::Fixed => {
            let digits: String = clean.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.trim_start_matches('0').len() > 7 {
                double(&clean)
            } else {
                single(&clean)
            }
        }
        TokenType::Float => single(&clean),
        TokenType::Double => double(&clean),
        TokenType::Hex => radix(&literal[2..], 16),
        TokenType::Octal => radix(
            literal
                .trim_start_matches('&')
                .trim_start_matches(|c| c == 'O' || c == 'o'),
            8,
        ),
        _ => Err(error!(Syntax; "EXPECTED NUMBER")),
    }
}

impl Statement {
    fn for_token(parse: &mut Parser, token: &Token) -> Result<Statement> {
        use TokenType as T;
        match token.kind {
            T::Let => Self::r#let(parse),
            T::Auto => Self::r#auto(parse),
            T::Beep => Ok(Statement::Beep),
            T::Chain => Self::r#chain(parse),
            T::Clear => Ok(Statement::Clear(parse.comma_list()?)),
            T::Cls => Ok(Statement::Cls),
            T::Color => Ok(Statement::Color(parse.comma_list()?)),
            T::Common => Ok(Statement::Common(parse.ident_list()?)),
            T::Cont => Ok(Statement::Cont),
            T::Data => Self::r#data(parse),
            T::Def => Self::r#def(parse),
            T::Dim => Ok(Statement::Dim(parse.variable_list()?)),
            T::End => Ok(Statement::End),
            T::Error => Ok(Statement::Error(parse.expression()?)),
            T::Files => Self::r#files(parse),
            T::For => Self::r#for(parse),
            T::Gosub => Ok(Statement::Gosub(parse.line_ref()?)),
            T::Goto => Ok(Statement::Goto(parse.line_ref()?)),
            T::If => Self::r#if(parse),
            T::Key => Self::r#key(parse),
            T::List => Self::r#list(parse),
            T::Load => Self::r#load(parse),
            T::Locate => Ok(Statement::Locate(parse.comma_list()?)),
            T::Merge => Ok(Statement::Merge(parse.expression()?)),
            T::New => Ok(Statement::New),
            T::Next => Self::r#next(parse),
            T::On => Self::r#on(parse),
            T::Palette => Ok(Statement::Palette(parse.comma_list()?)),
            T::Print => Self::r#print(parse),
            T::Read => Ok(Statement::Read(parse.variable_list()?)),
            T::Rem => Self::r#rem(parse),
            T::Restore => Ok(Statement::Restore(parse.optional_line_ref()?)),
            T::Resume => Self::r#resume(parse),
            T::Return => Ok(Statement::Return(parse.optional_line_ref()?)),
            T::Run => Self::r#run(parse),
            T::Screen => Ok(Statement::Screen(parse.comma_list()?)),
            T::Stop => Ok(Statement::Stop),
            T::Troff => Ok(Statement::Troff),
            T::Tron => Ok(Statement::Tron),
            T::Wend => Ok(Statement::Wend),
            T::While => Ok(Statement::While(parse.expression()?)),
            T::Illegal if token.literal.starts_with('"') => {
                Err(error!(Syntax; "UNTERMINATED STRING"))
            }
            _ => Err(error!(Syntax; "EXPECTED STATEMENT")),
        }
    }

    fn r#let(parse: &mut Parser) -> Result<Statement> {
        let var = parse.variable()?;
        parse.expect(TokenType::Eq)?;
        Ok(Statement::Let(var, parse.expression()?))
    }

    fn r#auto(parse: &mut Parser) -> Result<Statement> {
        let start = parse.optional_line_ref()?;
        let mut step = None;
        if parse.maybe(TokenType::Comma) {
            step = Some(parse.line_ref()?);
        }
        Ok(Statement::Auto(start, step))
    }

    fn r#chain(parse: &mut Parser) -> Result<Statement> {
        let path = parse.expression()?;
        let mut line = None;
        let mut all = false;
        if parse.maybe(TokenType::Comma) {
            line = parse.optional_line_ref()?;
            if parse.maybe(TokenType::Comma) {
                parse.expect(TokenType::All)?;
                all = true;
            }
        }
        Ok(Statement::Chain(path, line, all))
    }

    fn r#data(parse: &mut Parser) -> Result<Statement> {
        let mut items = vec![];
        loop {
            let token = parse.peek();
            match token.kind {
                TokenType::BStr => {
                    parse.next();
                    items.push(Datum::Raw(token.literal.as_str().into()));
                }
                TokenType::String => {
                    parse.next();
                    items.push(Datum::Quoted(token.literal.as_str().into()));
                }
                TokenType::Illegal => return Err(error!(Syntax; "UNTERMINATED STRING")),
                _ => items.push(Datum::Raw("".into())),
            }
            if !parse.maybe(TokenType::Comma) {
                return Ok(Statement::Data(items));
            }
        }
    }

    fn r#def(parse: &mut Parser) -> Result<Statement> {
        let mut ident = parse.ident()?;
        if ident.name() == "FN" {
            let name = format!("FN{}", parse.ident()?);
            ident = Ident::from(name.as_str());
        }
        if !ident.is_fn() {
            return Err(error!(Syntax; "EXPECTED FN"));
        }
        let mut params = vec![];
        if parse.maybe(TokenType::LParen) {
            params = parse.ident_list()?;
            parse.expect(TokenType::RParen)?;
        }
        parse.expect(TokenType::Eq)?;
        Ok(Statement::Def(ident, params, parse.expression()?))
    }

    fn r#files(parse: &mut Parser) -> Result<Statement> {
        if parse.at_end_of_statement() {
            return Ok(Statement::Files(None));
        }
        Ok(Statement::Files(Some(parse.expression()?)))
    }

    fn r#for(parse: &mut Parser) -> Result<Statement> {
        let ident = parse.ident()?;
        parse.expect(TokenType::Eq)?;
        let from = parse.expression()?;
        parse.expect(TokenType::To)?;
        let to = parse.expression()?;
        let mut step = None;
        if parse.maybe(TokenType::Step) {
            step = Some(parse.expression()?);
        }
        Ok(Statement::For(ident, from, to, step))
    }

    fn r#if(parse: &mut Parser) -> Result<Statement> {
        let predicate = parse.expression()?;
        let then_stmts = match parse.next().kind {
            TokenType::Then => parse.branch()?,
            TokenType::Goto => vec![Statement::Goto(parse.line_ref()?)],
            _ => return Err(error!(Syntax; "EXPECTED THEN OR GOTO")),
        };
        if parse.peek_kind() == TokenType::Colon && parse.peek_at(1) == TokenType::Else {
            parse.next();
        }
        let mut else_stmts = vec![];
        if parse.maybe(TokenType::Else) {
            else_stmts = parse.branch()?;
        }
        Ok(Statement::If(predicate, then_stmts, else_stmts))
    }

    fn r#key(parse: &mut Parser) -> Result<Statement> {
        let num = parse.expression()?;
        parse.expect(TokenType::Comma)?;
        Ok(Statement::Key(num, parse.expression()?))
    }

    fn r#list(parse: &mut Parser) -> Result<Statement> {
        let from = parse.optional_line_ref()?;
        if parse.maybe(TokenType::Minus) {
            return Ok(Statement::List(from, parse.optional_line_ref()?));
        }
        Ok(Statement::List(from, from))
    }

    fn r#load(parse: &mut Parser) -> Result<Statement> {
        let path = parse.expression()?;
        let mut run = false;
        if parse.maybe(TokenType::Comma) {
            match parse.ident()?.name() {
                "R" => run = true,
                _ => return Err(error!(Syntax; "EXPECTED R")),
            }
        }
        Ok(Statement::Load(path, run))
    }

    fn r#next(parse: &mut Parser) -> Result<Statement> {
        if parse.at_end_of_statement() {
            return Ok(Statement::Next(vec![]));
        }
        Ok(Statement::Next(parse.ident_list()?))
    }

    fn r#on(parse: &mut Parser) -> Result<Statement> {
        if parse.maybe(TokenType::Error) {
            parse.expect(TokenType::Goto)?;
            return Ok(Statement::OnErrorGoto(parse.line_ref()?));
        }
        let expr = parse.expression()?;
        match parse.next().kind {
            TokenType::Goto => Ok(Statement::OnGoto(expr, parse.line_ref_list()?)),
            TokenType::Gosub => Ok(Statement::OnGosub(expr, parse.line_ref_list()?)),
            _ => Err(error!(Syntax; "EXPECTED GOTO OR GOSUB")),
        }
    }

    fn r#print(parse: &mut Parser) -> Result<Statement> {
        let mut items = vec![];
        loop {
            if parse.at_end_of_statement() {
                return Ok(Statement::Print(items));
            }
            match parse.peek_kind() {
                TokenType::Comma => {
                    parse.next();
                    items.push(PrintItem::Comma);
                }
                TokenType::Semicolon => {
                    parse.next();
                    items.push(PrintItem::Semicolon);
                }
                TokenType::Using => return Err(error!(Syntax; "PRINT USING")),
                _ => items.push(PrintItem::Expr(parse.expression()?)),
            }
        }
    }

    fn r#rem(parse: &mut Parser) -> Result<Statement> {
        let token = parse.peek();
        if token.kind == TokenType::BStr {
            parse.next();
            return Ok(Statement::Rem(token.literal.as_str().into()));
        }
        Ok(Statement::Rem("".into()))
    }

    fn r#resume(parse: &mut Parser) -> Result<Statement> {
        if parse.maybe(TokenType::Next) {
            return Ok(Statement::Resume(ResumeAt::Next));
        }
        match parse.optional_line_ref()? {
            None | Some(0) => Ok(Statement::Resume(ResumeAt::Retry)),
            Some(n) => Ok(Statement::Resume(ResumeAt::Line(n))),
        }
    }

    fn r#run(parse: &mut Parser) -> Result<Statement> {
        if parse.at_end_of_statement() {
            return Ok(Statement::Run(None));
        }
        if parse.at_line_ref() {
            return Ok(Statement::Run(Some(parse.line_ref()?)));
        }
        let path = parse.expression()?;
        if parse.maybe(TokenType::Comma) {
            parse.ident()?;
        }
        Ok(Statement::Load(path, true))
    }
}
