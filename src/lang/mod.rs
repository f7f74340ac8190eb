/*!
# Language Module

Lexical analysis, tokenized program decoding and parsing of GW-BASIC.

Source text goes through [`lex`], tokenized programs through
[`tokenized::decode`]; both produce the same token stream which
[`parse`] turns into numbered [`Line`]s.

*/

#[macro_use]
mod error;
mod lex;
mod line;
mod parse;

pub mod ast;
pub mod token;
pub mod tokenized;

pub use error::text_for_error;
pub use error::Error;
pub use error::ErrorCode;
pub use lex::{lex, lex_bytes, Lexer};
pub use line::Line;
pub use parse::parse;

/// `None` means direct mode.
pub type LineNumber = Option<u16>;

pub trait MaxValue<T> {
    fn max_value() -> T;
}

impl MaxValue<u16> for LineNumber {
    fn max_value() -> u16 {
        65529
    }
}
