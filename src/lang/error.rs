use super::LineNumber;

#[derive(Clone, PartialEq)]
pub struct Error {
    code: u16,
    line_number: LineNumber,
    message: String,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
    };
    ($err:ident, $line:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).in_line_number($line)
    };
    ($err:ident; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).message($msg)
    };
    ($err:ident, $line:expr; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .in_line_number($line)
            .message($msg)
    };
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error::from_code(code as u16)
    }

    /// Errors raised by the `ERROR` statement may use any code, mapped or not.
    pub fn from_code(code: u16) -> Error {
        Error {
            code,
            line_number: None,
            message: String::new(),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code as u16
    }

    pub fn line_number(&self) -> LineNumber {
        self.line_number
    }

    pub fn is_direct(&self) -> bool {
        self.line_number.is_none()
    }

    pub fn text(&self) -> &'static str {
        text_for_error(self.code)
    }

    pub fn in_line_number(&self, line: LineNumber) -> Error {
        debug_assert!(self.line_number.is_none());
        Error {
            code: self.code,
            line_number: line,
            message: self.message.clone(),
        }
    }

    pub fn message(&self, message: &str) -> Error {
        debug_assert_eq!(self.message.len(), 0);
        Error {
            code: self.code,
            line_number: self.line_number,
            message: message.to_string(),
        }
    }
}

/// Numeric error codes as numbered by GW-BASIC.
///
/// The numbering is sparse. Codes 31-49, 54-69 and 71-75 are unassigned
/// and must stay that way; programs compare `ERR` against these exact values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    NextWithoutFor = 1,
    Syntax = 2,
    ReturnWoGosub = 3,
    OutOfData = 4,
    IllegalFuncCall = 5,
    Overflow = 6,
    OutOfMemory = 7,
    UndefinedLineNumber = 8,
    SubscriptRange = 9,
    DuplicateDefinition = 10,
    DivByZero = 11,
    IllegalDirect = 12,
    TypeMismatch = 13,
    StringSpace = 14,
    StringTooLong = 15,
    StringFormTooComplex = 16,
    CantContinue = 17,
    UndefinedFunction = 18,
    NoResume = 19,
    ResumeWoError = 20,
    Unprintable = 21,
    MissingOp = 22,
    LineOverflow = 23,
    DeviceTimeout = 24,
    DeviceFault = 25,
    ForWoNext = 26,
    OutOfPaper = 27,
    UnprintableErr = 28,
    WhileWoWend = 29,
    WendWoWhile = 30,
    FieldOverflow = 50,
    InternalErr = 51,
    BadFileNum = 52,
    FileNotFound = 53,
    PermissionDenied = 70,
    PathNotFound = 76,
}

/// Canonical one-line text for an error code. Never fails.
pub fn text_for_error(code: u16) -> &'static str {
    match code {
        1 => "NEXT without FOR",
        2 => "Syntax error",
        3 => "RETURN without GOSUB",
        4 => "Out of DATA",
        5 => "Illegal function call",
        6 => "Overflow",
        7 => "Out of memory",
        8 => "Undefined line number",
        9 => "Subscript out of range",
        10 => "Duplicate Definition",
        11 => "Division by zero",
        12 => "Illegal direct",
        13 => "Type mismatch",
        14 => "Out of string space",
        15 => "String too long",
        16 => "String formula too complex",
        17 => "Can't continue",
        18 => "Undefined user function",
        19 => "No RESUME",
        20 => "RESUME without error",
        22 => "Missing operand",
        23 => "Line buffer overflow",
        24 => "Device Timeout",
        25 => "Device Fault",
        26 => "FOR without NEXT",
        27 => "Out of Paper",
        29 => "WHILE without WEND",
        30 => "WEND without WHILE",
        50 => "FIELD overflow",
        51 => "Internal error",
        52 => "Bad file number",
        53 => "File not found",
        70 => "Permission Denied",
        76 => "Path not found",
        _ => "Unprintable error",
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} ({}) }}", self.to_string(), self.code)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.text())?;
        if let Some(line_number) = self.line_number {
            write!(f, " in {}", line_number)?;
        }
        if !self.message.is_empty() {
            write!(f, "; {}", self.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_for_error() {
        assert_eq!(text_for_error(ErrorCode::DivByZero as u16), "Division by zero");
        assert_eq!(text_for_error(ErrorCode::Syntax as u16), "Syntax error");
        assert_eq!(text_for_error(ErrorCode::PathNotFound as u16), "Path not found");
    }

    #[test]
    fn test_gaps_are_unprintable() {
        for code in (31..=49).chain(54..=69).chain(71..=75) {
            assert_eq!(text_for_error(code), "Unprintable error");
        }
        assert_eq!(text_for_error(0), "Unprintable error");
        assert_eq!(text_for_error(255), "Unprintable error");
        assert_eq!(text_for_error(u16::MAX), "Unprintable error");
    }

    #[test]
    fn test_historical_numbers() {
        assert_eq!(ErrorCode::UndefinedLineNumber as u16, 8);
        assert_eq!(ErrorCode::WendWoWhile as u16, 30);
        assert_eq!(ErrorCode::FieldOverflow as u16, 50);
        assert_eq!(ErrorCode::FileNotFound as u16, 53);
        assert_eq!(ErrorCode::PermissionDenied as u16, 70);
        assert_eq!(ErrorCode::PathNotFound as u16, 76);
    }

    #[test]
    fn test_display() {
        assert_eq!(error!(Syntax).to_string(), "Syntax error");
        assert_eq!(error!(ReturnWoGosub, Some(20)).to_string(), "RETURN without GOSUB in 20");
        assert_eq!(
            error!(Syntax, Some(10); "TRAILING COMMA").to_string(),
            "Syntax error in 10; TRAILING COMMA"
        );
        assert_eq!(Error::from_code(42).to_string(), "Unprintable error");
    }
}
