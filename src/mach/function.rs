use super::Val;
use crate::error;
use crate::lang::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::convert::TryFrom;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// ## Built-in functions

pub struct Function {
    rng: StdRng,
    last_rnd: f32,
}

impl Default for Function {
    fn default() -> Function {
        Function {
            rng: StdRng::from_entropy(),
            last_rnd: 0.0,
        }
    }
}

impl Function {
    pub fn arity(name: &str) -> Option<std::ops::RangeInclusive<usize>> {
        Some(match name {
            "ABS" | "ASC" | "CHR$" | "COS" | "INT" | "LEN" | "SGN" | "SIN" | "SQR" | "STR$"
            | "VAL" => 1..=1,
            "LEFT$" | "RIGHT$" => 2..=2,
            "MID$" => 2..=3,
            "RND" => 0..=1,
            _ => return None,
        })
    }

    pub fn call(&mut self, name: &str, mut args: Vec<Val>) -> Result<Val> {
        match Function::arity(name) {
            Some(range) if range.contains(&args.len()) => {}
            Some(_) => return Err(error!(Syntax; "WRONG NUMBER OF ARGUMENTS")),
            None => return Err(error!(UndefinedFunction)),
        }
        if name == "RND" {
            return self.rnd(args.pop());
        }
        let mut args = args.drain(..);
        let mut arg = || args.next().ok_or_else(|| error!(Syntax));
        match name {
            "ABS" => Function::abs(arg()?),
            "ASC" => Function::asc(arg()?),
            "CHR$" => Function::chr(arg()?),
            "COS" => Function::float(arg()?, f32::cos, f64::cos),
            "INT" => Function::float(arg()?, f32::floor, f64::floor),
            "LEFT$" => {
                let s = Rc::<str>::try_from(arg()?)?;
                let n = Function::length(arg()?)?;
                Ok(Val::String(s.chars().take(n).collect::<String>().into()))
            }
            "LEN" => {
                let s = Rc::<str>::try_from(arg()?)?;
                Ok(Val::Integer(s.chars().count() as i16))
            }
            "MID$" => {
                let s = Rc::<str>::try_from(arg()?)?;
                let start = Function::length(arg()?)?;
                if start == 0 {
                    return Err(error!(IllegalFuncCall));
                }
                let len = match arg() {
                    Ok(v) => Function::length(v)?,
                    Err(_) => 255,
                };
                let mid: String = s.chars().skip(start - 1).take(len).collect();
                Ok(Val::String(mid.into()))
            }
            "RIGHT$" => {
                let s = Rc::<str>::try_from(arg()?)?;
                let n = Function::length(arg()?)?;
                let count = s.chars().count();
                let right: String = s.chars().skip(count.saturating_sub(n)).collect();
                Ok(Val::String(right.into()))
            }
            "SGN" => {
                let n = f64::try_from(arg()?)?;
                Ok(Val::Integer(if n > 0.0 {
                    1
                } else if n < 0.0 {
                    -1
                } else {
                    0
                }))
            }
            "SIN" => Function::float(arg()?, f32::sin, f64::sin),
            "SQR" => {
                let v = arg()?;
                if f64::try_from(v.clone())? < 0.0 {
                    return Err(error!(IllegalFuncCall));
                }
                Function::float(v, f32::sqrt, f64::sqrt)
            }
            "STR$" => match arg()? {
                Val::String(_) => Err(error!(TypeMismatch)),
                v => Ok(Val::String(v.to_string().into())),
            },
            "VAL" => {
                let s = Rc::<str>::try_from(arg()?)?;
                Ok(Val::from_numeric_prefix(&s))
            }
            _ => Err(error!(UndefinedFunction)),
        }
    }

    fn abs(val: Val) -> Result<Val> {
        use Val::*;
        match val {
            Integer(n) => match n.checked_abs() {
                Some(n) => Ok(Integer(n)),
                None => Ok(Single((n as f32).abs())),
            },
            Single(n) => Ok(Single(n.abs())),
            Double(n) => Ok(Double(n.abs())),
            String(_) => Err(error!(TypeMismatch)),
        }
    }

    fn asc(val: Val) -> Result<Val> {
        let s = Rc::<str>::try_from(val)?;
        match s.chars().next() {
            Some(ch) => Ok(Val::Integer(ch as u32 as i16)),
            None => Err(error!(IllegalFuncCall)),
        }
    }

    fn chr(val: Val) -> Result<Val> {
        let n = i16::try_from(val)?;
        if !(0..=255).contains(&n) {
            return Err(error!(IllegalFuncCall));
        }
        let ch = char::from(n as u8);
        Ok(Val::String(ch.to_string().into()))
    }

    fn float(val: Val, f: fn(f32) -> f32, d: fn(f64) -> f64) -> Result<Val> {
        use Val::*;
        match val {
            Integer(n) => Ok(Single(f(n as f32))),
            Single(n) => Ok(Single(f(n))),
            Double(n) => Ok(Double(d(n))),
            String(_) => Err(error!(TypeMismatch)),
        }
    }

    fn length(val: Val) -> Result<usize> {
        let n = i16::try_from(val)?;
        if !(0..=255).contains(&n) {
            return Err(error!(IllegalFuncCall));
        }
        Ok(n as usize)
    }

    /// `RND(X)`: negative X reseeds, zero repeats the last number.
    fn rnd(&mut self, val: Option<Val>) -> Result<Val> {
        let x = match val {
            Some(v) => f32::try_from(v)?,
            None => 1.0,
        };
        if x < 0.0 {
            self.rng = StdRng::seed_from_u64(x.to_bits() as u64);
        }
        if x != 0.0 {
            self.last_rnd = self.rng.gen::<f32>();
        }
        Ok(Val::Single(self.last_rnd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Val>) -> Result<Val> {
        Function::default().call(name, args)
    }

    #[test]
    fn test_strings() {
        let s = || Val::String("HELLO".into());
        assert_eq!(
            call("LEFT$", vec![s(), Val::Integer(2)]).unwrap(),
            Val::String("HE".into())
        );
        assert_eq!(
            call("RIGHT$", vec![s(), Val::Integer(3)]).unwrap(),
            Val::String("LLO".into())
        );
        assert_eq!(
            call("MID$", vec![s(), Val::Integer(2), Val::Integer(3)]).unwrap(),
            Val::String("ELL".into())
        );
        assert_eq!(call("LEN", vec![s()]).unwrap(), Val::Integer(5));
        assert_eq!(call("ASC", vec![s()]).unwrap(), Val::Integer(72));
        assert_eq!(
            call("CHR$", vec![Val::Integer(65)]).unwrap(),
            Val::String("A".into())
        );
        assert_eq!(
            call("STR$", vec![Val::Integer(7)]).unwrap(),
            Val::String(" 7".into())
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            call("INT", vec![Val::Single(-2.5)]).unwrap(),
            Val::Single(-3.0)
        );
        assert_eq!(call("SGN", vec![Val::Double(-0.1)]).unwrap(), Val::Integer(-1));
        assert_eq!(call("ABS", vec![Val::Integer(-4)]).unwrap(), Val::Integer(4));
        assert!(call("SQR", vec![Val::Integer(-1)]).is_err());
        assert!(call("SIN", vec![]).is_err());
    }

    #[test]
    fn test_rnd() {
        let mut f = Function::default();
        f.call("RND", vec![Val::Integer(-1)]).unwrap();
        let a = f.call("RND", vec![]).unwrap();
        assert_eq!(f.call("RND", vec![Val::Integer(0)]).unwrap(), a);
        let mut g = Function::default();
        g.call("RND", vec![Val::Integer(-1)]).unwrap();
        assert_eq!(g.call("RND", vec![]).unwrap(), a);
    }
}
