use super::program::Cursor;
use crate::lang::LineNumber;
use std::collections::BTreeMap;

/// ## Session settings
///
/// Options read and written by statements like AUTO, ON ERROR GOTO,
/// TRON and SCREEN. One instance lives for a whole session; NEW resets it.

#[derive(Debug, Default, Clone)]
pub struct Settings {
    pub auto: Option<AutoNumber>,
    /// Target of `ON ERROR GOTO`.
    pub on_error: Option<u16>,
    /// Value of `ERR`.
    pub err: u16,
    /// Value of `ERL`.
    pub erl: LineNumber,
    /// Statement that raised the error being handled.
    pub resume: Option<Cursor>,
    /// Where `CONT` picks up.
    pub restart: Option<Cursor>,
    pub tracing: bool,
    pub screen: Vec<i16>,
    pub color: Vec<i16>,
    pub palette: BTreeMap<i16, i16>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoNumber {
    pub next: u16,
    pub step: u16,
}

impl Settings {
    /// Forget the error trap and anything pending on it.
    pub fn clear_trap(&mut self) {
        self.on_error = None;
        self.err = 0;
        self.erl = None;
        self.resume = None;
    }

    /// Line number AUTO will offer next, advancing past it.
    pub fn next_auto(&mut self) -> Option<u16> {
        let auto = self.auto.as_mut()?;
        let n = auto.next;
        match n.checked_add(auto.step) {
            Some(next) if next <= 65529 => auto.next = next,
            _ => self.auto = None,
        }
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_numbering() {
        let mut settings = Settings::default();
        assert_eq!(settings.next_auto(), None);
        settings.auto = Some(AutoNumber { next: 10, step: 5 });
        assert_eq!(settings.next_auto(), Some(10));
        assert_eq!(settings.next_auto(), Some(15));
        settings.auto = Some(AutoNumber {
            next: 65529,
            step: 10,
        });
        assert_eq!(settings.next_auto(), Some(65529));
        assert_eq!(settings.auto, None);
    }

    #[test]
    fn test_clear_trap() {
        let mut settings = Settings {
            on_error: Some(100),
            err: 11,
            erl: Some(20),
            ..Settings::default()
        };
        settings.clear_trap();
        assert_eq!(settings.on_error, None);
        assert_eq!(settings.err, 0);
        assert_eq!(settings.erl, None);
    }
}
