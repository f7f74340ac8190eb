use super::Val;
use crate::error;
use crate::lang::ast::Operator;
use crate::lang::Error;
use std::convert::TryFrom;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// ## Operators

pub struct Operation {}

/// Both operands promoted to a common type.
enum Pair {
    Integer(i16, i16),
    Single(f32, f32),
    Double(f64, f64),
    String(Rc<str>, Rc<str>),
}

fn pair(lhs: Val, rhs: Val) -> Result<Pair> {
    use Val::*;
    Ok(match (lhs, rhs) {
        (Integer(l), Integer(r)) => Pair::Integer(l, r),
        (Integer(l), Single(r)) => Pair::Single(l as f32, r),
        (Single(l), Integer(r)) => Pair::Single(l, r as f32),
        (Single(l), Single(r)) => Pair::Single(l, r),
        (Double(l), r @ Integer(_)) | (Double(l), r @ Single(_)) => {
            Pair::Double(l, f64::try_from(r)?)
        }
        (l @ Integer(_), Double(r)) | (l @ Single(_), Double(r)) => {
            Pair::Double(f64::try_from(l)?, r)
        }
        (Double(l), Double(r)) => Pair::Double(l, r),
        (String(l), String(r)) => Pair::String(l, r),
        _ => return Err(error!(TypeMismatch)),
    })
}

fn single(n: f32) -> Result<Val> {
    if n.is_finite() {
        Ok(Val::Single(n))
    } else {
        Err(error!(Overflow))
    }
}

fn double(n: f64) -> Result<Val> {
    if n.is_finite() {
        Ok(Val::Double(n))
    } else {
        Err(error!(Overflow))
    }
}

fn truth(b: bool) -> Result<Val> {
    Ok(Val::Integer(if b { -1 } else { 0 }))
}

impl Operation {
    pub fn unary(op: Operator, val: Val) -> Result<Val> {
        match op {
            Operator::Negate => Operation::negate(val),
            Operator::Positive => match val {
                Val::String(_) => Err(error!(TypeMismatch)),
                _ => Ok(val),
            },
            Operator::Not => Ok(Val::Integer(!i16::try_from(val)?)),
            _ => Err(error!(InternalErr; "NOT A UNARY OPERATOR")),
        }
    }

    pub fn binary(op: Operator, lhs: Val, rhs: Val) -> Result<Val> {
        use Operator::*;
        match op {
            Add => Operation::sum(lhs, rhs),
            Subtract => Operation::subtract(lhs, rhs),
            Multiply => Operation::multiply(lhs, rhs),
            Divide => Operation::divide(lhs, rhs),
            DivideInt => Operation::divide_int(lhs, rhs),
            Modulus => Operation::modulus(lhs, rhs),
            Power => Operation::power(lhs, rhs),
            Equal => truth(Operation::compare(lhs, rhs)? == std::cmp::Ordering::Equal),
            NotEqual => truth(Operation::compare(lhs, rhs)? != std::cmp::Ordering::Equal),
            Less => truth(Operation::compare(lhs, rhs)? == std::cmp::Ordering::Less),
            LessEqual => truth(Operation::compare(lhs, rhs)? != std::cmp::Ordering::Greater),
            Greater => truth(Operation::compare(lhs, rhs)? == std::cmp::Ordering::Greater),
            GreaterEqual => truth(Operation::compare(lhs, rhs)? != std::cmp::Ordering::Less),
            And | Or | Xor | Eqv | Imp => {
                let l = i16::try_from(lhs)?;
                let r = i16::try_from(rhs)?;
                Ok(Val::Integer(match op {
                    And => l & r,
                    Or => l | r,
                    Xor => l ^ r,
                    Eqv => !(l ^ r),
                    _ => !l | r,
                }))
            }
            Negate | Positive | Not => Err(error!(InternalErr; "NOT A BINARY OPERATOR")),
        }
    }

    pub fn negate(val: Val) -> Result<Val> {
        use Val::*;
        match val {
            Integer(n) => match n.checked_neg() {
                Some(n) => Ok(Integer(n)),
                None => Ok(Single(-(n as f32))),
            },
            Single(n) => Ok(Single(-n)),
            Double(n) => Ok(Double(-n)),
            String(_) => Err(error!(TypeMismatch)),
        }
    }

    pub fn sum(lhs: Val, rhs: Val) -> Result<Val> {
        match pair(lhs, rhs)? {
            Pair::Integer(l, r) => match l.checked_add(r) {
                Some(n) => Ok(Val::Integer(n)),
                None => single(l as f32 + r as f32),
            },
            Pair::Single(l, r) => single(l + r),
            Pair::Double(l, r) => double(l + r),
            Pair::String(l, r) => {
                if l.chars().count() + r.chars().count() > 255 {
                    return Err(error!(StringTooLong));
                }
                let mut s = l.to_string();
                s.push_str(&r);
                Ok(Val::String(s.into()))
            }
        }
    }

    pub fn subtract(lhs: Val, rhs: Val) -> Result<Val> {
        match pair(lhs, rhs)? {
            Pair::Integer(l, r) => match l.checked_sub(r) {
                Some(n) => Ok(Val::Integer(n)),
                None => single(l as f32 - r as f32),
            },
            Pair::Single(l, r) => single(l - r),
            Pair::Double(l, r) => double(l - r),
            Pair::String(..) => Err(error!(TypeMismatch)),
        }
    }

    pub fn multiply(lhs: Val, rhs: Val) -> Result<Val> {
        match pair(lhs, rhs)? {
            Pair::Integer(l, r) => match l.checked_mul(r) {
                Some(n) => Ok(Val::Integer(n)),
                None => single(l as f32 * r as f32),
            },
            Pair::Single(l, r) => single(l * r),
            Pair::Double(l, r) => double(l * r),
            Pair::String(..) => Err(error!(TypeMismatch)),
        }
    }

    /// `/` always yields a floating point result.
    pub fn divide(lhs: Val, rhs: Val) -> Result<Val> {
        match pair(lhs, rhs)? {
            Pair::Integer(_, 0) => Err(error!(DivByZero)),
            Pair::Integer(l, r) => single(l as f32 / r as f32),
            Pair::Single(_, r) if r == 0.0 => Err(error!(DivByZero)),
            Pair::Single(l, r) => single(l / r),
            Pair::Double(_, r) if r == 0.0 => Err(error!(DivByZero)),
            Pair::Double(l, r) => double(l / r),
            Pair::String(..) => Err(error!(TypeMismatch)),
        }
    }

    pub fn divide_int(lhs: Val, rhs: Val) -> Result<Val> {
        let (l, r) = Operation::integers(lhs, rhs)?;
        match l.checked_div(r) {
            Some(n) => Ok(Val::Integer(n)),
            None if r == 0 => Err(error!(DivByZero)),
            None => Err(error!(Overflow)),
        }
    }

    pub fn modulus(lhs: Val, rhs: Val) -> Result<Val> {
        let (l, r) = Operation::integers(lhs, rhs)?;
        match l.checked_rem(r) {
            Some(n) => Ok(Val::Integer(n)),
            None if r == 0 => Err(error!(DivByZero)),
            None => Ok(Val::Integer(0)),
        }
    }

    pub fn power(lhs: Val, rhs: Val) -> Result<Val> {
        match pair(lhs, rhs)? {
            Pair::Integer(l, r) => single((l as f32).powi(r as i32)),
            Pair::Single(l, r) => single(l.powf(r)),
            Pair::Double(l, r) => double(l.powf(r)),
            Pair::String(..) => Err(error!(TypeMismatch)),
        }
    }

    pub fn compare(lhs: Val, rhs: Val) -> Result<std::cmp::Ordering> {
        use std::cmp::Ordering;
        let ord = match pair(lhs, rhs)? {
            Pair::Integer(l, r) => l.cmp(&r),
            Pair::Single(l, r) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
            Pair::Double(l, r) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
            Pair::String(l, r) => l.cmp(&r),
        };
        Ok(ord)
    }

    fn integers(lhs: Val, rhs: Val) -> Result<(i16, i16)> {
        if lhs.is_string() || rhs.is_string() {
            return Err(error!(TypeMismatch));
        }
        Ok((i16::try_from(lhs)?, i16::try_from(rhs)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_promotes_on_overflow() {
        assert_eq!(
            Operation::sum(Val::Integer(32767), Val::Integer(1)).unwrap(),
            Val::Single(32768.0)
        );
        assert_eq!(
            Operation::multiply(Val::Integer(3), Val::Integer(4)).unwrap(),
            Val::Integer(12)
        );
    }

    #[test]
    fn test_divide() {
        assert_eq!(
            Operation::divide(Val::Integer(7), Val::Integer(2)).unwrap(),
            Val::Single(3.5)
        );
        assert!(Operation::divide(Val::Integer(7), Val::Integer(0))
            .unwrap_err()
            .is(crate::lang::ErrorCode::DivByZero));
        assert_eq!(
            Operation::divide_int(Val::Single(7.0), Val::Integer(2)).unwrap(),
            Val::Integer(3)
        );
        assert_eq!(
            Operation::modulus(Val::Integer(7), Val::Integer(3)).unwrap(),
            Val::Integer(1)
        );
    }

    #[test]
    fn test_type_mismatch() {
        let e = Operation::sum(Val::String("A".into()), Val::Integer(1)).unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::TypeMismatch));
    }

    #[test]
    fn test_relational_and_logical() {
        let t = Operation::binary(Operator::Less, Val::Integer(1), Val::Double(1.5)).unwrap();
        assert_eq!(t, Val::Integer(-1));
        let s = Operation::binary(
            Operator::Equal,
            Val::String("AB".into()),
            Val::String("AB".into()),
        )
        .unwrap();
        assert_eq!(s, Val::Integer(-1));
        let x = Operation::binary(Operator::Xor, Val::Integer(6), Val::Integer(3)).unwrap();
        assert_eq!(x, Val::Integer(5));
        let n = Operation::unary(Operator::Not, Val::Integer(0)).unwrap();
        assert_eq!(n, Val::Integer(-1));
    }

    #[test]
    fn test_concatenate() {
        let s = Operation::sum(Val::String("AB".into()), Val::String("CD".into())).unwrap();
        assert_eq!(s, Val::String("ABCD".into()));
    }
}
