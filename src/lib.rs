//! # GW-BASIC
//!
//! A GW-BASIC compatible interpreter core: lexer, tokenized program
//! decoder, parser, error catalog and a statement-at-a-time runtime
//! with classic line-number control flow.
//!
//! ```
//! use gwbasic::mach::{Event, Runtime};
//!
//! let mut runtime = Runtime::default();
//! runtime.enter("10 PRINT \"HELLO\"");
//! runtime.enter("RUN");
//! assert_eq!(runtime.execute(100), Event::Print("HELLO\n".to_string()));
//! ```

pub mod file;
pub mod lang;
pub mod mach;
