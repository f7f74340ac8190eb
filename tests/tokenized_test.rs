mod common;
use common::*;
use gwbasic::lang::tokenized::{decode, sniff, Format};
use gwbasic::lang::ErrorCode;
use gwbasic::mach::{Program, Runtime};

// 10 CLS
// 20 FOR I=1 TO 3:PRINT I
// 30 NEXT I
// 40 BEEP
// 50 END
const COUNTER: &[u8] = &[
    0xFF, 0x08, 0x12, 0x0A, 0x00, 0xC0, 0x00, 0x1A, 0x12, 0x14, 0x00, 0x82, 0x20, 0x49, 0xE7,
    0x12, 0x20, 0xCC, 0x20, 0x14, 0x3A, 0x91, 0x20, 0x49, 0x00, 0x22, 0x12, 0x1E, 0x00, 0x83,
    0x20, 0x49, 0x00, 0x28, 0x12, 0x28, 0x00, 0xC5, 0x00, 0x2E, 0x12, 0x32, 0x00, 0x81, 0x00,
    0x00, 0x00, 0x1A,
];

// 10 PRINT "Hello" / 20 Y = 150 / 30 Z = 48, saved with ,P
const PROTECTED_HELLO: &[u8] = &[
    0xFE, 0xE3, 0xA9, 0xBF, 0x54, 0xE2, 0x12, 0xBD, 0x59, 0x20, 0x65, 0x0D, 0x8F, 0xB0, 0xA7,
    0x90, 0xB3, 0x56, 0x67, 0xAA, 0x06, 0x0C, 0x44, 0xA1, 0xA1, 0xD6, 0x84, 0x91, 0x07, 0x9D,
    0xED, 0x3E, 0xD6, 0x27, 0x7F, 0x1C, 0xC4, 0x9B, 0x36, 0x1A,
];

#[test]
fn test_tokenized_statement_count() {
    assert_eq!(sniff(COUNTER), Format::Tokenized);
    let (program, errors) = Program::from_bytes(COUNTER);
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(program.line_count(), 5);
    assert_eq!(program.statement_count(), 6);
    assert_eq!(
        program.list(None, None).unwrap(),
        "10 CLS\n20 FOR I = 1 TO 3 : PRINT I\n30 NEXT I\n40 BEEP\n50 END\n"
    );
}

#[test]
fn test_plain_text_statement_count() {
    let src = b"10 PRINT \"This is the Start program.\"\n20 PRINT \"Saved as ASCII.\"";
    assert_eq!(sniff(src), Format::Text);
    let (program, errors) = Program::from_bytes(src);
    assert!(errors.is_empty());
    assert_eq!(program.statement_count(), 2);
}

#[test]
fn test_protected_program() {
    assert_eq!(sniff(PROTECTED_HELLO), Format::Protected);
    assert!(decode(PROTECTED_HELLO).is_protected());
    let (program, errors) = Program::from_bytes(PROTECTED_HELLO);
    assert!(errors.is_empty());
    assert!(program.is_protected());
    assert_eq!(program.line_count(), 3);
    assert!(program
        .list(None, None)
        .unwrap_err()
        .is(ErrorCode::IllegalFuncCall));
}

#[test]
fn test_run_tokenized_program() {
    let source = MemorySource::default().with("COUNTER.BAS", COUNTER);
    let mut r = Runtime::default();
    r.enter("RUN \"COUNTER.BAS\"");
    assert_eq!(exec_files(&mut r, &source), " 1 \n 2 \n 3 \n\x07");
}

#[test]
fn test_protected_program_runs_but_does_not_list() {
    let source = MemorySource::default().with("HELLO.BAS", PROTECTED_HELLO);
    let mut r = Runtime::default();
    r.enter("RUN \"HELLO.BAS\"");
    assert_eq!(exec_files(&mut r, &source), "Hello\n");
    r.enter("LIST");
    assert_eq!(exec(&mut r), "Illegal function call\n");
}

#[test]
fn test_truncated_file_keeps_whole_lines() {
    let (program, _) = Program::from_bytes(&COUNTER[..30]);
    assert_eq!(program.line_count(), 2);
}
