//! Recursive tagged value used for pad metadata and negotiation.
//!
//! A `Property` is the only vocabulary pads use to describe themselves to
//! each other (supported pixel formats, channel counts, stream titles, HTTP
//! headers, ...). Presence of a key in a pad's property map is the whole of
//! the negotiation protocol — see the converter rule in `streamforge-runtime`.

use std::collections::BTreeMap;

/// A property value: null, one of the scalar kinds, or an ordered
/// list/map of further properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Null,
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    List(Vec<Property>),
    Map(BTreeMap<String, Property>),
}

impl Default for Property {
    fn default() -> Self {
        Property::Null
    }
}

impl Property {
    pub fn new_list() -> Self {
        Property::List(Vec::new())
    }

    pub fn new_map() -> Self {
        Property::Map(BTreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Property::Null)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Property::Int(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Property::Double(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Property::Bool(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Property::String(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Property::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Property::Map(_))
    }

    /// Coerces to `i64`; non-numeric values yield 0, matching the permissive
    /// accessor style of the original property system.
    pub fn to_int(&self) -> i64 {
        match self {
            Property::Int(v) => *v,
            Property::Double(v) => *v as i64,
            Property::Bool(v) => *v as i64,
            _ => 0,
        }
    }

    pub fn to_double(&self) -> f64 {
        match self {
            Property::Int(v) => *v as f64,
            Property::Double(v) => *v,
            Property::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Property::Bool(v) => *v,
            Property::Int(v) => *v != 0,
            _ => false,
        }
    }

    pub fn to_str(&self) -> &str {
        match self {
            Property::String(s) => s.as_str(),
            _ => "",
        }
    }

    pub fn as_list(&self) -> Option<&[Property]> {
        match self {
            Property::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Property>> {
        match self {
            Property::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        matches!(self, Property::Map(m) if m.contains_key(key))
    }

    /// True if `self` is a list/value that "contains" `item` by equality, or
    /// if `self` equals `item` directly — mirrors the original's loose
    /// `contains` used by pad format-negotiation checks.
    pub fn contains(&self, item: &Property) -> bool {
        match self {
            Property::List(l) => l.contains(item),
            other => other == item,
        }
    }

    pub fn push_back(&mut self, value: Property) {
        if let Property::List(l) = self {
            l.push(value);
        }
    }

    pub fn push_front(&mut self, value: Property) {
        if let Property::List(l) = self {
            l.insert(0, value);
        }
    }
}

impl From<i64> for Property {
    fn from(v: i64) -> Self {
        Property::Int(v)
    }
}
impl From<i32> for Property {
    fn from(v: i32) -> Self {
        Property::Int(v as i64)
    }
}
impl From<u32> for Property {
    fn from(v: u32) -> Self {
        Property::Int(v as i64)
    }
}
impl From<f64> for Property {
    fn from(v: f64) -> Self {
        Property::Double(v)
    }
}
impl From<bool> for Property {
    fn from(v: bool) -> Self {
        Property::Bool(v)
    }
}
impl From<&str> for Property {
    fn from(v: &str) -> Self {
        Property::String(v.to_owned())
    }
}
impl From<String> for Property {
    fn from(v: String) -> Self {
        Property::String(v)
    }
}
impl<T: Into<Property>> From<Vec<T>> for Property {
    fn from(v: Vec<T>) -> Self {
        Property::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_contains_matches_scalar() {
        let fmts: Property = vec![1i64, 2, 3].into();
        assert!(fmts.contains(&Property::Int(2)));
        assert!(!fmts.contains(&Property::Int(9)));
    }

    #[test]
    fn map_round_trip() {
        let mut m = Property::new_map();
        if let Property::Map(ref mut map) = m {
            map.insert("width".into(), 1920.into());
        }
        assert!(m.contains_key("width"));
        assert_eq!(m.as_map().unwrap()["width"].to_int(), 1920);
    }
}
