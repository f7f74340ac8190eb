use gwbasic::lang::{lex, lex_bytes, token::*};
use quickcheck::{QuickCheck, TestResult};

fn kinds(s: &str) -> Vec<TokenType> {
    lex(s).iter().map(|t| t.kind).collect()
}

#[test]
fn test_keywords_any_case() {
    for s in &["Print", "PRINT", "print", "pRiNt"] {
        assert_eq!(lookup_ident(s), TokenType::Print);
    }
    assert_eq!(lookup_ident("PRINTER"), TokenType::Ident);
    assert_eq!(lookup_ident("goto"), TokenType::Goto);
}

#[test]
fn test_program_lines() {
    use TokenType::*;
    assert_eq!(
        kinds("10 FOR I = 1 TO 10 STEP 2\n20 NEXT I\n"),
        vec![
            LineNum, For, Ident, Eq, Int, To, Int, Step, Int, Eol, LineNum, Next, Ident, Eol, Eof
        ]
    );
}

#[test]
fn test_crlf_and_eof_marker() {
    let tokens = lex_bytes(b"10 CLS\r\n20 END\r\n\x1a");
    let kinds: Vec<TokenType> = tokens.iter().map(|t| t.kind).collect();
    use TokenType::*;
    assert_eq!(kinds, vec![LineNum, Cls, Eol, LineNum, End, Eol, Eof]);
}

#[test]
fn test_relational_pairs() {
    use TokenType::*;
    assert_eq!(
        kinds("10 IF A<>B AND C>=D THEN 20"),
        vec![LineNum, If, Ident, NotEq, Ident, And, Ident, Gte, Ident, Then, Int, Eof]
    );
}

#[test]
fn test_string_literal_keeps_case_and_spaces() {
    let tokens = lex("PRINT \"Hello,  World\"");
    assert_eq!(tokens[1], Token::new(TokenType::String, "Hello,  World"));
}

#[test]
fn test_display_round_trips_literals() {
    let tokens = lex("?\"A\";B$");
    let text: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    assert_eq!(text, vec!["?", "\"A\"", ";", "B$", ""]);
}

#[test]
fn prop_keyword_case_is_ignored() {
    fn property(keyword: usize, mask: Vec<bool>) -> TestResult {
        let kind = TokenType::KEYWORDS[keyword % TokenType::KEYWORDS.len()];
        let word: String = kind
            .to_string()
            .chars()
            .zip(mask.iter().chain(std::iter::repeat(&false)))
            .map(|(c, &lower)| if lower { c.to_ascii_lowercase() } else { c })
            .collect();
        TestResult::from_bool(lookup_ident(&word) == kind)
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(property as fn(usize, Vec<bool>) -> TestResult);
}
