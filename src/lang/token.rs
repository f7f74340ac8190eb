use std::collections::HashMap;

thread_local!(
    static KEYWORDS: HashMap<String, TokenType> = TokenType::KEYWORDS
        .iter()
        .map(|kind| (kind.to_string().to_ascii_lowercase(), *kind))
        .collect();
);

/// Returns the keyword kind for `ident`, in any letter case, or `TokenType::Ident`.
pub fn lookup_ident(ident: &str) -> TokenType {
    KEYWORDS.with(|keywords| match keywords.get(&ident.to_ascii_lowercase()) {
        Some(kind) => *kind,
        None => TokenType::Ident,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenType,
    pub literal: String,
}

impl Token {
    pub fn new(kind: TokenType, literal: &str) -> Token {
        Token {
            kind,
            literal: literal.to_string(),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.kind {
            TokenType::String => write!(f, "\"{}\"", self.literal),
            TokenType::Eof => Ok(()),
            _ => write!(f, "{}", self.literal),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum TokenType {
    Illegal,
    Eof,
    Eol,

    LineNum,
    Ident,
    BStr,
    Int,
    Fixed,
    Float,
    Double,
    Hex,
    Octal,
    String,

    Plus,
    Minus,
    Asterisk,
    Slash,
    BSlash,
    Caret,
    Eq,
    NotEq,
    Lt,
    Gt,
    Lte,
    Gte,

    Comma,
    Semicolon,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,

    All,
    And,
    Auto,
    Beep,
    Chain,
    Clear,
    Cls,
    Color,
    Common,
    Cont,
    Csrlin,
    Data,
    Def,
    Dim,
    Else,
    End,
    Eqv,
    Erl,
    Err,
    Error,
    False,
    Files,
    For,
    Gosub,
    Goto,
    If,
    Imp,
    Key,
    Let,
    List,
    Load,
    Locate,
    Merge,
    Mod,
    New,
    Next,
    Not,
    On,
    Or,
    Palette,
    Print,
    Read,
    Rem,
    Restore,
    Resume,
    Return,
    Run,
    Screen,
    Step,
    Stop,
    Then,
    To,
    Troff,
    Tron,
    True,
    Using,
    Wend,
    While,
    Xor,
}

impl TokenType {
    pub const KEYWORDS: &'static [TokenType] = &[
        TokenType::All,
        TokenType::And,
        TokenType::Auto,
        TokenType::Beep,
        TokenType::Chain,
        TokenType::Clear,
        TokenType::Cls,
        TokenType::Color,
        TokenType::Common,
        TokenType::Cont,
        TokenType::Csrlin,
        TokenType::Data,
        TokenType::Def,
        TokenType::Dim,
        TokenType::Else,
        TokenType::End,
        TokenType::Eqv,
        TokenType::Erl,
        TokenType::Err,
        TokenType::Error,
        TokenType::False,
        TokenType::Files,
        TokenType::For,
        TokenType::Gosub,
        TokenType::Goto,
        TokenType::If,
        TokenType::Imp,
        TokenType::Key,
        TokenType::Let,
        TokenType::List,
        TokenType::Load,
        TokenType::Locate,
        TokenType::Merge,
        TokenType::Mod,
        TokenType::New,
        TokenType::Next,
        TokenType::Not,
        TokenType::On,
        TokenType::Or,
        TokenType::Palette,
        TokenType::Print,
        TokenType::Read,
        TokenType::Rem,
        TokenType::Restore,
        TokenType::Resume,
        TokenType::Return,
        TokenType::Run,
        TokenType::Screen,
        TokenType::Step,
        TokenType::Stop,
        TokenType::Then,
        TokenType::To,
        TokenType::Troff,
        TokenType::Tron,
        TokenType::True,
        TokenType::Using,
        TokenType::Wend,
        TokenType::While,
        TokenType::Xor,
    ];

    pub fn is_keyword(self) -> bool {
        TokenType::KEYWORDS.contains(&self)
    }

    pub fn is_number(self) -> bool {
        use TokenType::*;
        matches!(self, Int | Fixed | Float | Double | Hex | Octal)
    }

    /// Tokens that may end a statement.
    pub fn is_terminator(self) -> bool {
        matches!(self, TokenType::Eol | TokenType::Eof | TokenType::Colon)
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use TokenType::*;
        let s = match self {
            Illegal => "ILLEGAL",
            Eof => "EOF",
            Eol => "EOL",
            LineNum => "####",
            Ident => "IDENT",
            BStr => "BSTR",
            Int => "INT",
            Fixed => "FIXED",
            Float => "FLOAT",
            Double => "DOUBLE",
            Hex => "&H",
            Octal => "&O",
            String => "STRING",
            Plus => "+",
            Minus => "-",
            Asterisk => "*",
            Slash => "/",
            BSlash => "\\",
            Caret => "^",
            Eq => "=",
            NotEq => "<>",
            Lt => "<",
            Gt => ">",
            Lte => "<=",
            Gte => ">=",
            Comma => ",",
            Semicolon => ";",
            Colon => ":",
            LParen => "(",
            RParen => ")",
            LBracket => "[",
            RBracket => "]",
            All => "ALL",
            And => "AND",
            Auto => "AUTO",
            Beep => "BEEP",
            Chain => "CHAIN",
            Clear => "CLEAR",
            Cls => "CLS",
            Color => "COLOR",
            Common => "COMMON",
            Cont => "CONT",
            Csrlin => "CSRLIN",
            Data => "DATA",
            Def => "DEF",
            Dim => "DIM",
            Else => "ELSE",
            End => "END",
            Eqv => "EQV",
            Erl => "ERL",
            Err => "ERR",
            Error => "ERROR",
            False => "FALSE",
            Files => "FILES",
            For => "FOR",
            Gosub => "GOSUB",
            Goto => "GOTO",
            If => "IF",
            Imp => "IMP",
            Key => "KEY",
            Let => "LET",
            List => "LIST",
            Load => "LOAD",
            Locate => "LOCATE",
            Merge => "MERGE",
            Mod => "MOD",
            New => "NEW",
            Next => "NEXT",
            Not => "NOT",
            On => "ON",
            Or => "OR",
            Palette => "PALETTE",
            Print => "PRINT",
            Read => "READ",
            Rem => "REM",
            Restore => "RESTORE",
            Resume => "RESUME",
            Return => "RETURN",
            Run => "RUN",
            Screen => "SCREEN",
            Step => "STEP",
            Stop => "STOP",
            Then => "THEN",
            To => "TO",
            Troff => "TROFF",
            Tron => "TRON",
            True => "TRUE",
            Using => "USING",
            Wend => "WEND",
            While => "WHILE",
            Xor => "XOR",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ident() {
        assert_eq!(lookup_ident("REM"), TokenType::Rem);
        assert_eq!(lookup_ident("Print"), TokenType::Print);
        assert_eq!(lookup_ident("print"), TokenType::Print);
        assert_eq!(lookup_ident("tRoFf"), TokenType::Troff);
        assert_eq!(lookup_ident("PICKLES"), TokenType::Ident);
        assert_eq!(lookup_ident("X"), TokenType::Ident);
    }

    #[test]
    fn test_keyword_round_trip() {
        for kind in TokenType::KEYWORDS.iter() {
            assert_eq!(lookup_ident(&kind.to_string()), *kind);
            assert!(kind.is_keyword());
        }
        assert!(!TokenType::Ident.is_keyword());
    }
}
