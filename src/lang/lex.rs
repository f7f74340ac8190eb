use super::token::{lookup_ident, Token, TokenType};
use std::iter::Peekable;
use std::str::Chars;

/// Lexes BASIC source text. The result always ends with an `Eof` token.
pub fn lex(s: &str) -> Vec<Token> {
    Lexer::new(s).collect()
}

/// Lexes raw bytes. Each byte becomes one character so no input is rejected.
pub fn lex_bytes(bytes: &[u8]) -> Vec<Token> {
    let s: String = bytes.iter().map(|&b| char::from(b)).collect();
    lex(&s)
}

fn is_basic_whitespace(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\r'
}

fn is_basic_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_basic_alphabetic(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn is_sigil(c: char) -> bool {
    c == '$' || c == '%' || c == '!' || c == '#'
}

const MAX_KEYWORD_LEN: usize = 8;

/// Ctrl-Z ends a saved ASCII listing.
const EOF_MARKER: char = '\x1a';

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Statement,
    Remark,
    Data,
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    mode: Mode,
    line_start: bool,
    fragment: bool,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(s: &'a str) -> Lexer<'a> {
        Lexer {
            chars: s.chars().peekable(),
            mode: Mode::Statement,
            line_start: true,
            fragment: false,
            done: false,
        }
    }

    /// Lexes verbatim text stored inside a tokenized program line.
    /// Fragments have no line numbers and produce no `Eol`/`Eof` tokens.
    pub(crate) fn fragment(s: &'a str, data: bool) -> Lexer<'a> {
        Lexer {
            chars: s.chars().peekable(),
            mode: if data { Mode::Data } else { Mode::Statement },
            line_start: false,
            fragment: true,
            done: false,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(pk) = self.chars.peek() {
            if !is_basic_whitespace(*pk) {
                break;
            }
            self.chars.next();
        }
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, s: &mut String, f: F) {
        while let Some(pk) = self.chars.peek() {
            if !f(*pk) {
                break;
            }
            s.push(*pk);
            self.chars.next();
        }
    }

    fn line_number(&mut self) -> Token {
        let mut s = String::new();
        self.take_while(&mut s, is_basic_digit);
        Token::new(TokenType::LineNum, &s)
    }

    fn number(&mut self) -> Token {
        let mut s = String::new();
        let mut decimal = false;
        let mut exp = false;
        while let Some(&ch) = self.chars.peek() {
            if is_basic_digit(ch) || (ch == '.' && !decimal && !exp) {
                decimal |= ch == '.';
            } else if matches!(ch, 'e' | 'E' | 'd' | 'D')
                && !exp
                && s.chars().any(is_basic_digit)
            {
                exp = true;
                s.push(ch);
                self.chars.next();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        s.push(sign);
                        self.chars.next();
                    }
                }
                continue;
            } else if ch == '!' || ch == '#' || ch == '%' {
                s.push(ch);
                self.chars.next();
                break;
            } else {
                break;
            }
            s.push(ch);
            self.chars.next();
        }
        Token::new(number_kind(&s), &s)
    }

    fn radix(&mut self) -> Token {
        let mut s = String::new();
        self.chars.next();
        s.push('&');
        let digits_from = match self.chars.peek() {
            Some(&c) if c == 'H' || c == 'h' => {
                s.push(c);
                self.chars.next();
                self.take_while(&mut s, |c| c.is_ascii_hexdigit());
                2
            }
            Some(&c) if c == 'O' || c == 'o' => {
                s.push(c);
                self.chars.next();
                self.take_while(&mut s, |c| ('0'..='7').contains(&c));
                2
            }
            Some(&c) if ('0'..='7').contains(&c) => {
                self.take_while(&mut s, |c| ('0'..='7').contains(&c));
                1
            }
            _ => return Token::new(TokenType::Illegal, &s),
        };
        if s.len() == digits_from {
            return Token::new(TokenType::Illegal, &s);
        }
        if s[1..2].eq_ignore_ascii_case("H") {
            Token::new(TokenType::Hex, &s)
        } else {
            Token::new(TokenType::Octal, &s)
        }
    }

    fn string(&mut self) -> Token {
        let mut s = String::new();
        self.chars.next();
        self.take_while(&mut s, |c| c != '"' && c != '\n');
        if let Some('"') = self.chars.peek() {
            self.chars.next();
            Token::new(TokenType::String, &s)
        } else {
            Token::new(TokenType::Illegal, &format!("\"{}", s))
        }
    }

    /// Keywords end as soon as they are spelled out, so `FORI=1TO10` and
    /// `PRINTI` lex the way crunched listings expect.
    fn word(&mut self) -> Token {
        let mut s = String::new();
        let mut digit = false;
        while let Some(&ch) = self.chars.peek() {
            s.push(ch);
            self.chars.next();
            if is_sigil(ch) {
                return Token::new(TokenType::Ident, &s);
            }
            if is_basic_digit(ch) {
                digit = true;
            }
            if !digit {
                if let Some(token) = self.keyword(&s) {
                    return token;
                }
            }
            match self.chars.peek() {
                Some(&pk) if is_basic_alphabetic(pk) && !digit => continue,
                Some(&pk) if is_basic_digit(pk) || is_sigil(pk) || pk == '.' => continue,
                _ => break,
            }
        }
        Token::new(TokenType::Ident, &s)
    }

    /// Matches a keyword, preferring a longer one that shares the prefix (`ERR`, `ERROR`).
    fn keyword(&mut self, s: &str) -> Option<Token> {
        let mut kind = lookup_ident(s);
        if !kind.is_keyword() {
            return None;
        }
        let mut word = s.to_string();
        let mut extended = word.clone();
        let mut take = 0;
        let mut ahead = self.chars.clone();
        for n in 1..=MAX_KEYWORD_LEN {
            match ahead.next() {
                Some(c) if is_basic_alphabetic(c) => extended.push(c),
                _ => break,
            }
            let longer = lookup_ident(&extended);
            if longer != TokenType::Ident {
                kind = longer;
                word = extended.clone();
                take = n;
            }
        }
        for _ in 0..take {
            self.chars.next();
        }
        match kind {
            TokenType::Rem => self.mode = Mode::Remark,
            TokenType::Data => self.mode = Mode::Data,
            _ => {}
        }
        Some(Token::new(kind, &word))
    }

    fn remark(&mut self) -> Token {
        let mut s = String::new();
        self.take_while(&mut s, |c| c != '\n');
        Token::new(TokenType::BStr, s.trim_end())
    }

    fn data_item(&mut self) -> Token {
        match self.chars.peek() {
            Some(',') => {
                self.chars.next();
                Token::new(TokenType::Comma, ",")
            }
            Some(':') => {
                self.chars.next();
                self.mode = Mode::Statement;
                Token::new(TokenType::Colon, ":")
            }
            Some('"') => self.string(),
            _ => {
                let mut s = String::new();
                self.take_while(&mut s, |c| c != ',' && c != ':' && c != '\n');
                Token::new(TokenType::BStr, s.trim_end())
            }
        }
    }

    fn pair(&mut self, kind: TokenType, literal: &str) -> Token {
        self.chars.next();
        Token::new(kind, literal)
    }

    fn minutia(&mut self) -> Token {
        use TokenType::*;
        let ch = match self.chars.next() {
            Some(ch) => ch,
            None => return Token::new(Eof, ""),
        };
        let pk = self.chars.peek().copied();
        match (ch, pk) {
            ('<', Some('=')) => self.pair(Lte, "<="),
            ('<', Some('>')) => self.pair(NotEq, "<>"),
            ('>', Some('=')) => self.pair(Gte, ">="),
            ('>', Some('<')) => self.pair(NotEq, "><"),
            ('=', Some('<')) => self.pair(Lte, "=<"),
            ('=', Some('>')) => self.pair(Gte, "=>"),
            ('<', _) => Token::new(Lt, "<"),
            ('>', _) => Token::new(Gt, ">"),
            ('=', _) => Token::new(Eq, "="),
            ('+', _) => Token::new(Plus, "+"),
            ('-', _) => Token::new(Minus, "-"),
            ('*', _) => Token::new(Asterisk, "*"),
            ('/', _) => Token::new(Slash, "/"),
            ('\\', _) => Token::new(BSlash, "\\"),
            ('^', _) => Token::new(Caret, "^"),
            (',', _) => Token::new(Comma, ","),
            (';', _) => Token::new(Semicolon, ";"),
            (':', _) => Token::new(Colon, ":"),
            ('(', _) => Token::new(LParen, "("),
            (')', _) => Token::new(RParen, ")"),
            ('[', _) => Token::new(LBracket, "["),
            (']', _) => Token::new(RBracket, "]"),
            ('?', _) => Token::new(Print, "?"),
            ('\'', _) => {
                self.mode = Mode::Remark;
                Token::new(Rem, "'")
            }
            _ => Token::new(Illegal, &ch.to_string()),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.mode == Mode::Remark {
            self.mode = Mode::Statement;
            return Some(self.remark());
        }
        self.skip_whitespace();
        let pk = match self.chars.peek() {
            Some(pk) if *pk != EOF_MARKER => *pk,
            _ => {
                self.done = true;
                if self.fragment {
                    return None;
                }
                return Some(Token::new(TokenType::Eof, ""));
            }
        };
        if pk == '\n' {
            self.chars.next();
            self.line_start = true;
            self.mode = Mode::Statement;
            return Some(Token::new(TokenType::Eol, "\n"));
        }
        if self.mode == Mode::Data {
            return Some(self.data_item());
        }
        if self.line_start {
            self.line_start = false;
            if is_basic_digit(pk) {
                return Some(self.line_number());
            }
        }
        if is_basic_digit(pk) || pk == '.' {
            return Some(self.number());
        }
        if is_basic_alphabetic(pk) {
            return Some(self.word());
        }
        if pk == '"' {
            return Some(self.string());
        }
        if pk == '&' {
            return Some(self.radix());
        }
        Some(self.minutia())
    }
}

/// Classifies a scanned numeric literal by its sigil, exponent marker and size.
pub(crate) fn number_kind(s: &str) -> TokenType {
    if !s.chars().any(is_basic_digit) {
        return TokenType::Illegal;
    }
    match s.chars().last() {
        Some('%') => return TokenType::Int,
        Some('!') => return TokenType::Float,
        Some('#') => return TokenType::Double,
        _ => {}
    }
    if s.contains(|c| c == 'D' || c == 'd') {
        return TokenType::Double;
    }
    if s.contains(|c| c == 'E' || c == 'e') {
        return TokenType::Float;
    }
    if s.contains('.') {
        return TokenType::Fixed;
    }
    if s.parse::<i16>().is_ok() {
        return TokenType::Int;
    }
    if s.trim_start_matches('0').len() > 7 {
        TokenType::Double
    } else {
        TokenType::Fixed
    }
}

/// Joins relational operators that arrive as separate tokens, as in tokenized programs.
pub(crate) fn collapse_relational(tokens: &mut Vec<Token>) {
    use TokenType::*;
    let mut locs: Vec<(usize, Token)> = vec![];
    let mut windows = tokens.windows(2).enumerate();
    while let Some((index, tt)) = windows.next() {
        let kind = match (tt[0].kind, tt[1].kind) {
            (Lt, Eq) | (Eq, Lt) => Lte,
            (Gt, Eq) | (Eq, Gt) => Gte,
            (Lt, Gt) | (Gt, Lt) => NotEq,
            _ => continue,
        };
        let literal = format!("{}{}", tt[0].literal, tt[1].literal);
        locs.push((index, Token::new(kind, &literal)));
        windows.next();
    }
    while let Some((index, token)) = locs.pop() {
        tokens.splice(index..index + 2, Some(token));
    }
}
