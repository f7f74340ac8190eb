use crate::error;
use crate::lang::Error;
use std::convert::TryFrom;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// ## Run-time values

#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    String(Rc<str>),
    Integer(i16),
    Single(f32),
    Double(f64),
}

impl Val {
    /// BASIC truth: any non-zero number.
    pub fn is_true(&self) -> Result<bool> {
        use Val::*;
        match self {
            Integer(n) => Ok(*n != 0),
            Single(n) => Ok(*n != 0.0),
            Double(n) => Ok(*n != 0.0),
            String(_) => Err(error!(TypeMismatch)),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Val::String(_))
    }

    /// Parses a numeric prefix the way `VAL` and `READ` do.
    /// Blanks are ignored and parsing stops at the first unusable character.
    pub fn from_numeric_prefix(s: &str) -> Val {
        let s: String = s.chars().filter(|c| *c != ' ').collect();
        let s = s.to_ascii_uppercase();
        let mut end = 0;
        let mut seen_digit = false;
        let mut seen_dot = false;
        let mut double = false;
        let mut chars = s.char_indices().peekable();
        if let Some((_, '+')) | Some((_, '-')) = chars.peek() {
            chars.next();
        }
        while let Some((i, c)) = chars.next() {
            match c {
                '0'..='9' => {
                    seen_digit = true;
                    end = i + 1;
                }
                '.' if !seen_dot => {
                    seen_dot = true;
                    end = i + 1;
                }
                'E' | 'D' if seen_digit => {
                    double = c == 'D';
                    let mut exp_end = None;
                    if let Some((_, '+')) | Some((_, '-')) = chars.peek() {
                        chars.next();
                    }
                    while let Some((j, '0'..='9')) = chars.peek() {
                        exp_end = Some(j + 1);
                        chars.next();
                    }
                    if let Some(e) = exp_end {
                        end = e;
                    }
                    break;
                }
                _ => break,
            }
        }
        let text = s[..end].replace('D', "E");
        match text.parse::<f64>() {
            Ok(n) if double => Val::Double(n),
            Ok(n) => Val::Single(n as f32),
            Err(_) => Val::Integer(0),
        }
    }
}

impl TryFrom<Val> for i16 {
    type Error = Error;
    fn try_from(val: Val) -> Result<i16> {
        use Val::*;
        match val {
            Integer(n) => Ok(n),
            Single(n) => f64_to_i16(n as f64),
            Double(n) => f64_to_i16(n),
            String(_) => Err(error!(TypeMismatch)),
        }
    }
}

fn f64_to_i16(n: f64) -> Result<i16> {
    let n = n.round();
    if n >= i16::min_value() as f64 && n <= i16::max_value() as f64 {
        Ok(n as i16)
    } else {
        Err(error!(Overflow))
    }
}

impl TryFrom<Val> for f32 {
    type Error = Error;
    fn try_from(val: Val) -> Result<f32> {
        use Val::*;
        match val {
            Integer(n) => Ok(n as f32),
            Single(n) => Ok(n),
            Double(n) => {
                if n.abs() > f32::MAX as f64 {
                    Err(error!(Overflow))
                } else {
                    Ok(n as f32)
                }
            }
            String(_) => Err(error!(TypeMismatch)),
        }
    }
}

impl TryFrom<Val> for f64 {
    type Error = Error;
    fn try_from(val: Val) -> Result<f64> {
        use Val::*;
        match val {
            Integer(n) => Ok(n as f64),
            Single(n) => Ok(n as f64),
            Double(n) => Ok(n),
            String(_) => Err(error!(TypeMismatch)),
        }
    }
}

impl TryFrom<Val> for Rc<str> {
    type Error = Error;
    fn try_from(val: Val) -> Result<Rc<str>> {
        match val {
            Val::String(s) => Ok(s),
            _ => Err(error!(TypeMismatch)),
        }
    }
}

/// Numbers display the way `PRINT` and `STR$` show them:
/// a leading blank or minus sign, no leading zero before the point.
impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Val::*;
        match self {
            String(s) => write!(f, "{}", s),
            Integer(n) => {
                if *n < 0 {
                    write!(f, "{}", n)
                } else {
                    write!(f, " {}", n)
                }
            }
            Single(n) => write!(f, "{}", format_float(*n as f64, 7, 'E')),
            Double(n) => write!(f, "{}", format_float(*n, 16, 'D')),
        }
    }
}

fn format_float(n: f64, digits: usize, exp_char: char) -> String {
    let sign = if n < 0.0 { "-" } else { " " };
    if n == 0.0 {
        return format!("{}0", sign);
    }
    if !n.is_finite() {
        return format!("{}{}", sign, n.abs());
    }
    let sci = format!("{:.*e}", digits - 1, n.abs());
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    let mantissa = mantissa.replace('.', "");
    let significant = mantissa.trim_end_matches('0');
    let significant = if significant.is_empty() {
        "0"
    } else {
        significant
    };
    let body = if exp >= digits as i32 || exp < -3 {
        let (first, rest) = significant.split_at(1);
        let exp_sign = if exp < 0 { '-' } else { '+' };
        if rest.is_empty() {
            format!("{}{}{}{:02}", first, exp_char, exp_sign, exp.abs())
        } else {
            format!("{}.{}{}{}{:02}", first, rest, exp_char, exp_sign, exp.abs())
        }
    } else if exp < 0 {
        let zeros = "0".repeat((-exp - 1) as usize);
        format!(".{}{}", zeros, significant)
    } else {
        let point = exp as usize + 1;
        if significant.len() <= point {
            format!("{}{}", significant, "0".repeat(point - significant.len()))
        } else {
            format!("{}.{}", &significant[..point], &significant[point..])
        }
    };
    format!("{}{}", sign, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_integer() {
        assert_eq!(Val::Integer(5).to_string(), " 5");
        assert_eq!(Val::Integer(-5).to_string(), "-5");
    }

    #[test]
    fn test_display_single() {
        assert_eq!(Val::Single(0.5).to_string(), " .5");
        assert_eq!(Val::Single(-1.25).to_string(), "-1.25");
        assert_eq!(Val::Single(3.5).to_string(), " 3.5");
        assert_eq!(Val::Single(1234567.0).to_string(), " 1234567");
        assert_eq!(Val::Single(12345678.0).to_string(), " 1.234568E+07");
        assert_eq!(Val::Single(0.001).to_string(), " .001");
        assert_eq!(Val::Single(0.0001).to_string(), " 1E-04");
        assert_eq!(Val::Single(100.0).to_string(), " 100");
    }

    #[test]
    fn test_display_double() {
        assert_eq!(Val::Double(1.5).to_string(), " 1.5");
        assert_eq!(Val::Double(1e20).to_string(), " 1D+20");
    }

    #[test]
    fn test_to_i16() {
        assert_eq!(i16::try_from(Val::Single(2.5)).unwrap(), 3);
        assert_eq!(i16::try_from(Val::Double(-1.4)).unwrap(), -1);
        assert!(i16::try_from(Val::Single(40000.0)).is_err());
        assert!(i16::try_from(Val::String("1".into())).is_err());
    }

    #[test]
    fn test_numeric_prefix() {
        assert_eq!(Val::from_numeric_prefix("12abc"), Val::Single(12.0));
        assert_eq!(Val::from_numeric_prefix(" - 1 5"), Val::Single(-15.0));
        assert_eq!(Val::from_numeric_prefix("1.5E2"), Val::Single(150.0));
        assert_eq!(Val::from_numeric_prefix("2D3"), Val::Double(2000.0));
        assert_eq!(Val::from_numeric_prefix("X"), Val::Integer(0));
    }
}
