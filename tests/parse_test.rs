use gwbasic::lang::{ast::*, lex, parse, ErrorCode, Line};
use quickcheck::{Arbitrary, Gen, QuickCheck, TestResult};

fn parse_lines(s: &str) -> Vec<Line> {
    let (lines, errors) = parse(&lex(s));
    assert!(errors.is_empty(), "{:?}", errors);
    lines
}

#[test]
fn test_listing_parses_to_same_tree() {
    let src = "10 FOR I=1 TO 10 STEP 2:PRINT I;\n\
               20 IF A$=\"X\" THEN 100 ELSE GOSUB 200\n\
               30 ON ERROR GOTO 300\n\
               40 DIM B(5,5):B(1,2)=-3^2\n\
               50 DATA 1,\"TWO\",THREE\n\
               60 PRINT NOT A AND B OR C XOR D\n\
               70 X=(1+2)*3 MOD 4\\2\n";
    let lines = parse_lines(src);
    let listed: String = lines.iter().map(|l| format!("{}\n", l)).collect();
    assert_eq!(parse_lines(&listed), lines);
}

#[test]
fn test_negative_integer_constant_lists_as_hex() {
    let lines = parse_lines("10 A=&HFFFF:B=&H8000\n");
    assert_eq!(
        lines[0].statements()[0],
        Statement::Let(Variable::Unary(Ident::from("A")), Expression::Integer(-1))
    );
    let listed = lines[0].to_string();
    assert_eq!(listed, "10 A = &HFFFF : B = &H8000");
    assert_eq!(parse_lines(&listed), lines);
}

#[test]
fn test_crunched_listing_parses_like_spaced() {
    let crunched = parse_lines("10 FORI=1TO3:PRINTI:NEXTI\n20 IFI>3THENPRINT\"DONE\"ELSEGOTO10\n");
    let spaced = parse_lines(
        "10 FOR I=1 TO 3:PRINT I:NEXT I\n20 IF I>3 THEN PRINT \"DONE\" ELSE GOTO 10\n",
    );
    assert_eq!(crunched, spaced);
}

#[test]
fn test_statement_count() {
    let lines = parse_lines("10 A=1:B=2:C=3\n20 IF A THEN B=1:C=2\n30 REM A:B");
    let counts: Vec<usize> = lines.iter().map(|l| l.statements().len()).collect();
    assert_eq!(counts, vec![3, 1, 1]);
}

#[test]
fn test_direct_line() {
    let lines = parse_lines("PRINT 1");
    assert!(lines[0].is_direct());
    assert_eq!(lines[0].number(), None);
}

#[test]
fn test_empty_numbered_line_deletes() {
    let lines = parse_lines("10\n");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].is_empty());
}

#[test]
fn test_common_and_chain() {
    let lines = parse_lines("10 COMMON A,B$\n20 CHAIN \"NEXT\",100,ALL");
    assert_eq!(
        lines[0].statements(),
        &[Statement::Common(vec![Ident::from("A"), Ident::from("B$")])]
    );
    assert_eq!(
        lines[1].statements(),
        &[Statement::Chain(
            Expression::String("NEXT".into()),
            Some(100),
            true
        )]
    );
}

#[test]
fn test_line_number_out_of_range() {
    let (lines, errors) = parse(&lex("65530 END"));
    assert!(lines.is_empty());
    assert!(errors[0].is(ErrorCode::Syntax));
}

#[test]
fn test_syntax_errors_carry_line() {
    let (_, errors) = parse(&lex("10 PRINT 1+\n20 FOR\n"));
    let lines: Vec<Option<u16>> = errors.iter().map(|e| e.line_number()).collect();
    assert_eq!(lines, vec![Some(10), Some(20)]);
}

#[test]
fn prop_parser_never_panics() {
    fn property(s: String) -> TestResult {
        let (lines, errors) = parse(&lex(&s));
        TestResult::from_bool(
            lines.iter().all(|l| !(l.is_direct() && l.is_empty()))
                && errors.iter().all(|e| e.code() > 0),
        )
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(property as fn(String) -> TestResult);
}

#[derive(Clone, Debug)]
struct ListedLine(Line);

const NAMES: &[&str] = &["A", "X1", "Q%", "Z#", "N!"];

const BINARY: &[Operator] = &[
    Operator::Imp,
    Operator::Eqv,
    Operator::Xor,
    Operator::Or,
    Operator::And,
    Operator::Equal,
    Operator::NotEqual,
    Operator::Less,
    Operator::LessEqual,
    Operator::Greater,
    Operator::GreaterEqual,
    Operator::Add,
    Operator::Subtract,
    Operator::Modulus,
    Operator::DivideInt,
    Operator::Multiply,
    Operator::Divide,
    Operator::Power,
];

fn arbitrary_expression(g: &mut Gen, depth: usize) -> Expression {
    let pick = if depth == 0 { u8::arbitrary(g) % 2 } else { u8::arbitrary(g) % 5 };
    match pick {
        0 => Expression::Integer(i16::arbitrary(g)),
        1 => {
            let name = g.choose(NAMES).copied().unwrap_or("A");
            Expression::Var(Variable::Unary(Ident::from(name)))
        }
        2 => {
            let op = if bool::arbitrary(g) { Operator::Negate } else { Operator::Not };
            Expression::Unary(op, Box::new(arbitrary_expression(g, depth - 1)))
        }
        _ => {
            let op = g.choose(BINARY).copied().unwrap_or(Operator::Add);
            Expression::Binary(
                op,
                Box::new(arbitrary_expression(g, depth - 1)),
                Box::new(arbitrary_expression(g, depth - 1)),
            )
        }
    }
}

impl Arbitrary for ListedLine {
    fn arbitrary(g: &mut Gen) -> ListedLine {
        let count = 1 + usize::arbitrary(g) % 3;
        let statements = (0..count)
            .map(|_| {
                let expr = arbitrary_expression(g, 4);
                if bool::arbitrary(g) {
                    Statement::Print(vec![PrintItem::Expr(expr)])
                } else {
                    let name = g.choose(NAMES).copied().unwrap_or("A");
                    Statement::Let(Variable::Unary(Ident::from(name)), expr)
                }
            })
            .collect();
        ListedLine(Line::new(Some(10), statements))
    }
}

#[test]
fn prop_listing_reparses_to_same_tree() {
    fn property(line: ListedLine) -> TestResult {
        let listed = line.0.to_string();
        let (lines, errors) = parse(&lex(&listed));
        TestResult::from_bool(errors.is_empty() && lines == vec![line.0])
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(property as fn(ListedLine) -> TestResult);
}
