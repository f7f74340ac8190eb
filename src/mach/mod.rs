/*!
## Machine Module

Program storage and the statement-at-a-time runtime that executes it.

*/

mod function;
mod keys;
mod operation;
mod program;
mod runtime;
mod settings;
mod stack;
mod val;
mod var;

pub use function::Function;
pub use keys::{function_key_label, KeyBuffer, KeySender, KeySettings, FUNCTION_KEYS};
pub use operation::Operation;
pub use program::{Cursor, DataItem, Program};
pub use runtime::{Event, LoadKind, LoadRequest, Runtime, State};
pub use settings::{AutoNumber, Settings};
pub use stack::Stack;
pub use val::Val;
pub use var::Var;
