/*!
Decoder for programs saved by GW-BASIC in tokenized form.

A tokenized file starts with `0xFF`. A protected file starts with `0xFE`
and holds the same records passed through the GW-BASIC protection cipher.
Anything else is plain text.

Each record is a little-endian next-line pointer, a little-endian line
number, the token payload and a `0x00` terminator. A zero pointer ends
the program.

*/

use super::lex::{collapse_relational, lex, number_kind, Lexer};
use super::token::{lookup_ident, Token, TokenType};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Tokenized,
    Protected,
}

pub fn sniff(bytes: &[u8]) -> Format {
    match bytes.first() {
        Some(0xFF) => Format::Tokenized,
        Some(0xFE) => Format::Protected,
        _ => Format::Text,
    }
}

#[derive(Debug, PartialEq)]
pub enum Decoded {
    Text(String),
    Tokens { tokens: Vec<Token>, protected: bool },
}

impl Decoded {
    pub fn is_protected(&self) -> bool {
        matches!(self, Decoded::Tokens { protected: true, .. })
    }

    /// The token stream, lexing plain text when needed.
    pub fn into_tokens(self) -> Vec<Token> {
        match self {
            Decoded::Text(s) => lex(&s),
            Decoded::Tokens { tokens, .. } => tokens,
        }
    }
}

/// Never fails. A truncated or malformed tokenized program keeps
/// the lines decoded before the damage.
pub fn decode(bytes: &[u8]) -> Decoded {
    match sniff(bytes) {
        Format::Text => {
            let end = bytes.iter().position(|&b| b == 0x1A).unwrap_or(bytes.len());
            Decoded::Text(bytes[..end].iter().map(|&b| char::from(b)).collect())
        }
        Format::Tokenized => Decoded::Tokens {
            tokens: decode_records(&bytes[1..]),
            protected: false,
        },
        Format::Protected => Decoded::Tokens {
            tokens: decode_records(&unprotect(&bytes[1..])),
            protected: true,
        },
    }
}

const KEY13: [u8; 13] = [
    0xA9, 0x84, 0x8D, 0xCD, 0x75, 0x83, 0x43, 0x63, 0x24, 0x83, 0x19, 0xF7, 0x9A,
];
const KEY11: [u8; 11] = [
    0x1E, 0x1D, 0xC4, 0x77, 0x26, 0x97, 0xE0, 0x74, 0x59, 0x88, 0x7C,
];

/// Reverses the protection cipher. Input starts after the `0xFE` marker.
pub fn unprotect(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .enumerate()
        .map(|(n, &c)| {
            let i = n % 143;
            let x = c.wrapping_sub(11).wrapping_add((i % 11) as u8);
            let x = x ^ KEY13[i % 13] ^ KEY11[i % 11];
            x.wrapping_add(13).wrapping_sub((i % 13) as u8)
        })
        .collect()
}

fn decode_records(bytes: &[u8]) -> Vec<Token> {
    let mut reader = Reader { bytes, pos: 0 };
    let mut tokens = vec![];
    let mut lines = 0;
    loop {
        match reader.u16() {
            Some(0) => break,
            Some(_) => {}
            None => {
                warn!(lines, "tokenized program ends without terminator");
                break;
            }
        }
        let number = match reader.u16() {
            Some(number) => number,
            None => {
                warn!(lines, "tokenized program truncated in line header");
                break;
            }
        };
        match LineDecoder::new(&mut reader).decode() {
            Some(line) => {
                tokens.push(Token::new(TokenType::LineNum, &number.to_string()));
                tokens.extend(line);
                tokens.push(Token::new(TokenType::Eol, "\n"));
                lines += 1;
            }
            None => {
                warn!(lines, line = number, "tokenized program truncated in line body");
                break;
            }
        }
    }
    debug!(lines, "decoded tokenized program");
    tokens.push(Token::new(TokenType::Eof, ""));
    tokens
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn u8(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn u16(&mut self) -> Option<u16> {
        let bytes = self.take(2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let bytes = self.bytes.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(bytes)
    }
}

struct LineDecoder<'r, 'a> {
    reader: &'r mut Reader<'a>,
    tokens: Vec<Token>,
    text: String,
    in_quote: bool,
}

impl<'r, 'a> LineDecoder<'r, 'a> {
    fn new(reader: &'r mut Reader<'a>) -> LineDecoder<'r, 'a> {
        LineDecoder {
            reader,
            tokens: vec![],
            text: String::new(),
            in_quote: false,
        }
    }

    fn decode(mut self) -> Option<Vec<Token>> {
        loop {
            let b = self.reader.u8()?;
            if self.in_quote && b != 0x00 {
                self.text.push(char::from(b));
                self.in_quote = b != b'"';
                continue;
            }
            match b {
                0x00 => break,
                b'"' => {
                    self.text.push('"');
                    self.in_quote = true;
                }
                b':' => self.colon()?,
                0x0B => {
                    let n = self.reader.u16()?;
                    self.number(TokenType::Octal, format!("&O{:o}", n));
                }
                0x0C => {
                    let n = self.reader.u16()?;
                    self.number(TokenType::Hex, format!("&H{:X}", n));
                }
                0x0D | 0x0E => {
                    let n = self.reader.u16()?;
                    self.decimal(n.to_string());
                }
                0x0F => {
                    let n = self.reader.u8()?;
                    self.decimal(n.to_string());
                }
                0x11..=0x1B => self.decimal((b - 0x11).to_string()),
                0x1C => {
                    let n = self.reader.u16()? as i16;
                    self.decimal(n.to_string());
                }
                0x1D => {
                    let bytes = self.reader.take(4)?;
                    let n = mbf_to_f64(bytes) as f32;
                    self.number(TokenType::Float, format!("{}!", n));
                }
                0x1F => {
                    let bytes = self.reader.take(8)?;
                    self.number(TokenType::Double, format!("{}#", mbf_to_f64(bytes)));
                }
                0x81..=0xF4 => self.keyword(keyword(b), b)?,
                0xFD => {
                    let code = self.reader.u8()?;
                    self.keyword(keyword_fd(code), code)?
                }
                0xFE => {
                    let code = self.reader.u8()?;
                    self.keyword(keyword_fe(code), code)?
                }
                0xFF => {
                    let code = self.reader.u8()?;
                    self.keyword(keyword_ff(code), code)?
                }
                _ => self.text.push(char::from(b)),
            }
        }
        if self.in_quote {
            self.text.push('"');
        }
        self.flush();
        collapse_relational(&mut self.tokens);
        Some(self.tokens)
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.tokens.extend(Lexer::fragment(&self.text, false));
            self.text.clear();
        }
    }

    fn push(&mut self, kind: TokenType, literal: &str) {
        self.flush();
        self.tokens.push(Token::new(kind, literal));
    }

    fn number(&mut self, kind: TokenType, literal: String) {
        self.push(kind, &literal);
    }

    fn decimal(&mut self, literal: String) {
        self.push(number_kind(&literal), &literal);
    }

    /// `:ELSE` is stored for `ELSE` and `:REM'` for `'`.
    fn colon(&mut self) -> Option<()> {
        match (self.reader.peek(), self.reader.peek_at(1)) {
            (Some(0xA1), _) => {}
            (Some(0x8F), Some(0xD9)) => {
                self.reader.take(2)?;
                self.remark("'")?;
            }
            _ => self.text.push(':'),
        }
        Some(())
    }

    fn remark(&mut self, word: &str) -> Option<()> {
        self.push(TokenType::Rem, word);
        let mut s = String::new();
        while self.reader.peek()? != 0x00 {
            s.push(char::from(self.reader.u8()?));
        }
        self.push(TokenType::BStr, s.trim_end());
        Some(())
    }

    fn data(&mut self) -> Option<()> {
        self.push(TokenType::Data, "DATA");
        let mut s = String::new();
        let mut quoted = false;
        loop {
            let b = self.reader.peek()?;
            if b == 0x00 || (b == b':' && !quoted) {
                break;
            }
            quoted ^= b == b'"';
            s.push(char::from(b));
            self.reader.u8()?;
        }
        self.tokens.extend(Lexer::fragment(&s, true));
        Some(())
    }

    fn keyword(&mut self, word: Option<&'static str>, code: u8) -> Option<()> {
        use TokenType::*;
        let word = match word {
            Some(word) => word,
            None => {
                self.text.push(char::from(code));
                return Some(());
            }
        };
        let kind = match word {
            ">" => Gt,
            "=" => Eq,
            "<" => Lt,
            "+" => Plus,
            "-" => Minus,
            "*" => Asterisk,
            "/" => Slash,
            "^" => Caret,
            "\\" => BSlash,
            "'" | "REM" => return self.remark(word),
            "DATA" => return self.data(),
            _ => lookup_ident(word),
        };
        if kind == Ident {
            if self.text.ends_with(|c: char| c.is_ascii_alphanumeric()) {
                self.text.push(' ');
            }
            self.text.push_str(word);
            return Some(());
        }
        self.push(kind, word);
        if kind == While && self.reader.peek() == Some(0xE9) {
            self.reader.u8()?;
        }
        Some(())
    }
}

/// Converts a Microsoft Binary Format float of 4 or 8 bytes.
pub fn mbf_to_f64(bytes: &[u8]) -> f64 {
    let n = bytes.len();
    if n < 2 || bytes[n - 1] == 0 {
        return 0.0;
    }
    let exp = bytes[n - 1] as i32;
    let negative = bytes[n - 2] & 0x80 != 0;
    let mut mantissa = (bytes[n - 2] | 0x80) as u64;
    for &b in bytes[..n - 2].iter().rev() {
        mantissa = (mantissa << 8) | b as u64;
    }
    let bits = ((n - 1) * 8) as i32;
    let value = mantissa as f64 / 2f64.powi(bits) * 2f64.powi(exp - 128);
    if negative {
        -value
    } else {
        value
    }
}

fn keyword(code: u8) -> Option<&'static str> {
    Some(match code {
        0x81 => "END",
        0x82 => "FOR",
        0x83 => "NEXT",
        0x84 => "DATA",
        0x85 => "INPUT",
        0x86 => "DIM",
        0x87 => "READ",
        0x88 => "LET",
        0x89 => "GOTO",
        0x8A => "RUN",
        0x8B => "IF",
        0x8C => "RESTORE",
        0x8D => "GOSUB",
        0x8E => "RETURN",
        0x8F => "REM",
        0x90 => "STOP",
        0x91 => "PRINT",
        0x92 => "CLEAR",
        0x93 => "LIST",
        0x94 => "NEW",
        0x95 => "ON",
        0x96 => "WAIT",
        0x97 => "DEF",
        0x98 => "POKE",
        0x99 => "CONT",
        0x9C => "OUT",
        0x9D => "LPRINT",
        0x9E => "LLIST",
        0xA0 => "WIDTH",
        0xA1 => "ELSE",
        0xA2 => "TRON",
        0xA3 => "TROFF",
        0xA4 => "SWAP",
        0xA5 => "ERASE",
        0xA6 => "EDIT",
        0xA7 => "ERROR",
        0xA8 => "RESUME",
        0xA9 => "DELETE",
        0xAA => "AUTO",
        0xAB => "RENUM",
        0xAC => "DEFSTR",
        0xAD => "DEFINT",
        0xAE => "DEFSNG",
        0xAF => "DEFDBL",
        0xB0 => "LINE",
        0xB1 => "WHILE",
        0xB2 => "WEND",
        0xB3 => "CALL",
        0xB7 => "WRITE",
        0xB8 => "OPTION",
        0xB9 => "RANDOMIZE",
        0xBA => "OPEN",
        0xBB => "CLOSE",
        0xBC => "LOAD",
        0xBD => "MERGE",
        0xBE => "SAVE",
        0xBF => "COLOR",
        0xC0 => "CLS",
        0xC1 => "MOTOR",
        0xC2 => "BSAVE",
        0xC3 => "BLOAD",
        0xC4 => "SOUND",
        0xC5 => "BEEP",
        0xC6 => "PSET",
        0xC7 => "PRESET",
        0xC8 => "SCREEN",
        0xC9 => "KEY",
        0xCA => "LOCATE",
        0xCC => "TO",
        0xCD => "THEN",
        0xCE => "TAB(",
        0xCF => "STEP",
        0xD0 => "USR",
        0xD1 => "FN",
        0xD2 => "SPC(",
        0xD3 => "NOT",
        0xD4 => "ERL",
        0xD5 => "ERR",
        0xD6 => "STRING$",
        0xD7 => "USING",
        0xD8 => "INSTR",
        0xD9 => "'",
        0xDA => "VARPTR",
        0xDB => "CSRLIN",
        0xDC => "POINT",
        0xDD => "OFF",
        0xDE => "INKEY$",
        0xE6 => ">",
        0xE7 => "=",
        0xE8 => "<",
        0xE9 => "+",
        0xEA => "-",
        0xEB => "*",
        0xEC => "/",
        0xED => "^",
        0xEE => "AND",
        0xEF => "OR",
        0xF0 => "XOR",
        0xF1 => "EQV",
        0xF2 => "IMP",
        0xF3 => "MOD",
        0xF4 => "\\",
        _ => return None,
    })
}

fn keyword_fd(code: u8) -> Option<&'static str> {
    Some(match code {
        0x81 => "CVI",
        0x82 => "CVS",
        0x83 => "CVD",
        0x84 => "MKI$",
        0x85 => "MKS$",
        0x86 => "MKD$",
        0x8B => "EXTERR",
        _ => return None,
    })
}

fn keyword_fe(code: u8) -> Option<&'static str> {
    Some(match code {
        0x81 => "FILES",
        0x82 => "FIELD",
        0x83 => "SYSTEM",
        0x84 => "NAME",
        0x85 => "LSET",
        0x86 => "RSET",
        0x87 => "KILL",
        0x88 => "PUT",
        0x89 => "GET",
        0x8A => "RESET",
        0x8B => "COMMON",
        0x8C => "CHAIN",
        0x8D => "DATE$",
        0x8E => "TIME$",
        0x8F => "PAINT",
        0x90 => "COM",
        0x91 => "CIRCLE",
        0x92 => "DRAW",
        0x93 => "PLAY",
        0x94 => "TIMER",
        0x95 => "ERDEV",
        0x96 => "IOCTL",
        0x97 => "CHDIR",
        0x98 => "MKDIR",
        0x99 => "RMDIR",
        0x9A => "SHELL",
        0x9B => "ENVIRON",
        0x9C => "VIEW",
        0x9D => "WINDOW",
        0x9E => "PMAP",
        0x9F => "PALETTE",
        0xA0 => "LCOPY",
        0xA1 => "CALLS",
        0xA4 => "NOISE",
        0xA5 => "PCOPY",
        0xA6 => "TERM",
        0xA7 => "LOCK",
        0xA8 => "UNLOCK",
        _ => return None,
    })
}

fn keyword_ff(code: u8) -> Option<&'static str> {
    Some(match code {
        0x81 => "LEFT$",
        0x82 => "RIGHT$",
        0x83 => "MID$",
        0x84 => "SGN",
        0x85 => "INT",
        0x86 => "ABS",
        0x87 => "SQR",
        0x88 => "RND",
        0x89 => "SIN",
        0x8A => "LOG",
        0x8B => "EXP",
        0x8C => "COS",
        0x8D => "TAN",
        0x8E => "ATN",
        0x8F => "FRE",
        0x90 => "INP",
        0x91 => "POS",
        0x92 => "LEN",
        0x93 => "STR$",
        0x94 => "VAL",
        0x95 => "ASC",
        0x96 => "CHR$",
        0x97 => "PEEK",
        0x98 => "SPACE$",
        0x99 => "OCT$",
        0x9A => "HEX$",
        0x9B => "LPOS",
        0x9C => "CINT",
        0x9D => "CSNG",
        0x9E => "CDBL",
        0x9F => "FIX",
        0xA0 => "PEN",
        0xA1 => "STICK",
        0xA2 => "STRIG",
        0xA3 => "EOF",
        0xA4 => "LOC",
        0xA5 => "LOF",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};
    use TokenType::*;

    const HELLO: &[u8] = &[
        0xFF, 0x7C, 0x12, 0x0A, 0x00, 0x91, 0x20, 0x22, 0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x22, 0x00,
        0x87, 0x12, 0x14, 0x00, 0x59, 0x20, 0xE7, 0x20, 0x0F, 0x96, 0x00, 0x92, 0x12, 0x1E, 0x00,
        0x5A, 0x20, 0xE7, 0x20, 0x0F, 0x30, 0x00, 0x00, 0x00, 0x1A,
    ];

    fn tokens(bytes: &[u8]) -> Vec<Token> {
        decode(bytes).into_tokens()
    }

    #[test]
    fn test_sniff() {
        assert_eq!(sniff(HELLO), Format::Tokenized);
        assert_eq!(sniff(&[0xFE]), Format::Protected);
        assert_eq!(sniff(b"10 END"), Format::Text);
        assert_eq!(sniff(&[]), Format::Text);
    }

    #[test]
    fn test_decode_hello() {
        let expect = vec![
            Token::new(LineNum, "10"),
            Token::new(Print, "PRINT"),
            Token::new(String, "Hello"),
            Token::new(Eol, "\n"),
            Token::new(LineNum, "20"),
            Token::new(Ident, "Y"),
            Token::new(Eq, "="),
            Token::new(Int, "150"),
            Token::new(Eol, "\n"),
            Token::new(LineNum, "30"),
            Token::new(Ident, "Z"),
            Token::new(Eq, "="),
            Token::new(Int, "48"),
            Token::new(Eol, "\n"),
            Token::new(Eof, ""),
        ];
        assert_eq!(tokens(HELLO), expect);
    }

    #[test]
    fn test_text_stops_at_eof_marker() {
        let decoded = decode(b"10 PRINT 1\r\n\x1a\x00garbage");
        assert_eq!(decoded, Decoded::Text("10 PRINT 1\r\n".to_string()));
    }

    #[test]
    fn test_truncation_keeps_complete_lines() {
        for cut in 1..HELLO.len() - 3 {
            let tokens = tokens(&HELLO[..cut]);
            assert_eq!(tokens.last().map(|t| t.kind), Some(Eof));
            let lines = tokens.iter().filter(|t| t.kind == LineNum).count();
            assert!(lines <= 3);
            if cut >= 26 {
                assert!(lines >= 2, "cut {} gave {} lines", cut, lines);
            }
        }
    }

    #[test]
    fn test_numeric_constants() {
        let bytes = [
            0xFF, 0x01, 0x01, 0x05, 0x00, 0x91, 0x20, 0x1C, 0x39, 0x30, 0x2C, 0x0C, 0xFF, 0x00,
            0x2C, 0x0B, 0x08, 0x00, 0x2C, 0x1D, 0x00, 0x00, 0x40, 0x81, 0x2C, 0x1B, 0x00, 0x00,
            0x00,
        ];
        let tokens = tokens(&bytes);
        let literals: Vec<&str> = tokens.iter().map(|t| t.literal.as_str()).collect();
        assert_eq!(
            literals,
            vec!["5", "PRINT", "12345", ",", "&HFF", ",", "&O10", ",", "1.5!", ",", "10", "\n", ""]
        );
    }

    #[test]
    fn test_folded_forms() {
        // 10 IF A THEN 20 ELSE 30 ' note
        let bytes = [
            0xFF, 0x01, 0x01, 0x0A, 0x00, 0x8B, 0x20, 0x41, 0x20, 0xCD, 0x20, 0x0E, 0x14, 0x00,
            0x20, 0x3A, 0xA1, 0x20, 0x0E, 0x1E, 0x00, 0x20, 0x3A, 0x8F, 0xD9, 0x20, 0x6E, 0x6F,
            0x74, 0x65, 0x00, 0x00, 0x00,
        ];
        let kinds: Vec<TokenType> = tokens(&bytes).iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![LineNum, If, Ident, Then, Int, Else, Int, Rem, BStr, Eol, Eof]
        );
    }

    #[test]
    fn test_function_keywords_become_identifiers() {
        // 10 X=FNA(LEN(B$))
        let bytes = [
            0xFF, 0x01, 0x01, 0x0A, 0x00, 0x58, 0xE7, 0xD1, 0x41, 0x28, 0xFF, 0x92, 0x28, 0x42,
            0x24, 0x29, 0x29, 0x00, 0x00, 0x00,
        ];
        let literals: Vec<std::string::String> =
            tokens(&bytes).into_iter().map(|t| t.literal).collect();
        assert_eq!(
            literals,
            vec!["10", "X", "=", "FNA", "(", "LEN", "(", "B$", ")", ")", "\n", ""]
        );
    }

    #[test]
    fn test_mbf() {
        assert_eq!(mbf_to_f64(&[0x00, 0x00, 0x00, 0x81]), 1.0);
        assert_eq!(mbf_to_f64(&[0x00, 0x00, 0x80, 0x81]), -1.0);
        assert_eq!(mbf_to_f64(&[0x00, 0x00, 0x20, 0x84]), 10.0);
        assert_eq!(mbf_to_f64(&[0x12, 0x34, 0x56, 0x00]), 0.0);
    }

    #[test]
    fn prop_decoder_never_panics() {
        fn property(bytes: Vec<u8>, protected: bool) -> TestResult {
            let mut input = vec![if protected { 0xFE } else { 0xFF }];
            input.extend(bytes);
            let tokens = decode(&input).into_tokens();
            TestResult::from_bool(tokens.last().map(|t| t.kind) == Some(Eof))
        }
        let mut qc = QuickCheck::new().tests(500);
        qc.quickcheck(property as fn(Vec<u8>, bool) -> TestResult);
    }
}
