use super::Val;
use crate::error;
use crate::lang::ast::Ident;
use crate::lang::Error;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// ## Variable memory
///
/// Scalars are keyed by name with sigil; `A` and `A!` are the same variable.
/// Array elements are keyed by their subscripts followed by the array name.

#[derive(Debug, Default)]
pub struct Var {
    vars: HashMap<Rc<str>, Val>,
    dims: HashMap<Rc<str>, Vec<i16>>,
}

fn key(ident: &Ident) -> Rc<str> {
    match ident {
        Ident::Single(name) => name.trim_end_matches('!').into(),
        _ => ident.name().into(),
    }
}

fn default_for(ident: &Ident) -> Val {
    match ident {
        Ident::String(_) => Val::String("".into()),
        Ident::Integer(_) => Val::Integer(0),
        Ident::Double(_) => Val::Double(0.0),
        Ident::Plain(_) | Ident::Single(_) => Val::Single(0.0),
    }
}

impl Var {
    pub fn new() -> Var {
        Var::default()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
        self.dims.clear();
    }

    /// Keeps only the listed variables and arrays.
    pub fn retain(&mut self, keep: &[Ident]) {
        let names: Vec<Rc<str>> = keep.iter().map(key).collect();
        self.vars.retain(|k, _| {
            let base = k.rsplit(',').next().unwrap_or(k);
            names.iter().any(|n| **n == *base)
        });
        self.dims.retain(|k, _| names.iter().any(|n| n == k));
    }

    pub fn fetch(&self, ident: &Ident) -> Val {
        match self.vars.get(&key(ident)) {
            Some(val) => val.clone(),
            None => default_for(ident),
        }
    }

    pub fn store(&mut self, ident: &Ident, value: Val) -> Result<()> {
        let value = Var::coerce(ident, value)?;
        self.insert(key(ident), value)
    }

    pub fn fetch_array(&mut self, ident: &Ident, subscripts: Vec<Val>) -> Result<Val> {
        let key = self.build_array_key(ident, subscripts)?;
        Ok(match self.vars.get(&key) {
            Some(val) => val.clone(),
            None => default_for(ident),
        })
    }

    pub fn store_array(&mut self, ident: &Ident, subscripts: Vec<Val>, value: Val) -> Result<()> {
        let key = self.build_array_key(ident, subscripts)?;
        let value = Var::coerce(ident, value)?;
        self.insert(key, value)
    }

    pub fn dimension_array(&mut self, ident: &Ident, subscripts: Vec<Val>) -> Result<()> {
        let name = key(ident);
        if self.dims.contains_key(&name) {
            return Err(error!(DuplicateDefinition));
        }
        let dims = Var::subscripts(subscripts)?;
        self.dims.insert(name, dims);
        Ok(())
    }

    fn build_array_key(&mut self, ident: &Ident, subscripts: Vec<Val>) -> Result<Rc<str>> {
        let requested = Var::subscripts(subscripts)?;
        let name = key(ident);
        let dimensioned = self
            .dims
            .entry(name.clone())
            .or_insert_with(|| vec![10; requested.len()]);
        if dimensioned.len() != requested.len() {
            return Err(error!(SubscriptRange));
        }
        if requested.iter().zip(dimensioned.iter()).any(|(r, d)| r > d) {
            return Err(error!(SubscriptRange));
        }
        let mut s: String = requested.iter().map(|r| format!("{},", r)).collect();
        s.push_str(&name);
        Ok(s.into())
    }

    fn subscripts(subscripts: Vec<Val>) -> Result<Vec<i16>> {
        let mut vec_i16 = Vec::with_capacity(subscripts.len());
        for v in subscripts {
            let i = i16::try_from(v)?;
            if i < 0 {
                return Err(error!(SubscriptRange));
            }
            vec_i16.push(i);
        }
        Ok(vec_i16)
    }

    fn coerce(ident: &Ident, value: Val) -> Result<Val> {
        Ok(match ident {
            Ident::String(_) => match value {
                Val::String(s) => {
                    if s.chars().count() > 255 {
                        return Err(error!(StringTooLong));
                    }
                    Val::String(s)
                }
                _ => return Err(error!(TypeMismatch)),
            },
            _ if value.is_string() => return Err(error!(TypeMismatch)),
            Ident::Integer(_) => Val::Integer(i16::try_from(value)?),
            Ident::Double(_) => Val::Double(f64::try_from(value)?),
            Ident::Plain(_) | Ident::Single(_) => Val::Single(f32::try_from(value)?),
        })
    }

    fn insert(&mut self, key: Rc<str>, value: Val) -> Result<()> {
        if self.vars.len() > u16::max_value() as usize {
            return Err(error!(OutOfMemory));
        }
        self.vars.insert(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        let mut var = Var::new();
        assert_eq!(var.fetch(&"A".into()), Val::Single(0.0));
        assert_eq!(var.fetch(&"A$".into()), Val::String("".into()));
        var.store(&"A".into(), Val::Integer(3)).unwrap();
        assert_eq!(var.fetch(&"A!".into()), Val::Single(3.0));
        var.store(&"B%".into(), Val::Single(2.6)).unwrap();
        assert_eq!(var.fetch(&"B%".into()), Val::Integer(3));
        assert!(var.store(&"C$".into(), Val::Integer(1)).is_err());
    }

    #[test]
    fn test_arrays() {
        let mut var = Var::new();
        let a: Ident = "A".into();
        var.store_array(&a, vec![Val::Integer(10)], Val::Integer(1))
            .unwrap();
        let e = var.fetch_array(&a, vec![Val::Integer(11)]).unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::SubscriptRange));
        let b: Ident = "B".into();
        var.dimension_array(&b, vec![Val::Integer(20), Val::Integer(2)])
            .unwrap();
        let e = var.dimension_array(&b, vec![Val::Integer(5)]).unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::DuplicateDefinition));
        assert!(var.fetch_array(&b, vec![Val::Integer(20)]).is_err());
        assert_eq!(
            var.fetch_array(&b, vec![Val::Integer(20), Val::Integer(2)])
                .unwrap(),
            Val::Single(0.0)
        );
    }

    #[test]
    fn test_retain() {
        let mut var = Var::new();
        var.store(&"A".into(), Val::Integer(1)).unwrap();
        var.store(&"B".into(), Val::Integer(2)).unwrap();
        var.store_array(&"C".into(), vec![Val::Integer(1)], Val::Integer(3))
            .unwrap();
        var.retain(&["A".into(), "C".into()]);
        assert_eq!(var.fetch(&"A".into()), Val::Single(1.0));
        assert_eq!(var.fetch(&"B".into()), Val::Single(0.0));
        assert_eq!(
            var.fetch_array(&"C".into(), vec![Val::Integer(1)]).unwrap(),
            Val::Single(3.0)
        );
    }
}
