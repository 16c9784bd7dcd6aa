//! KFX value model.
//!
//! Style properties and content entries carry values from a small tagged
//! union. Measures are exact decimals (coefficient times a power of ten) so
//! that a value written as `2.5d-1` reads back as exactly `0.25`.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::kfx::symbol::Sym;

/// Number of significant figures kept for most measures.
pub const NOMINAL_SIG_FIGS: u32 = 3;
/// Line-height keeps more precision (the default is `1.0101 lh`).
pub const LINE_HEIGHT_SIG_FIGS: u32 = 5;
/// Percent measures keep enough digits for `9.375%`-style indents.
pub const PERCENT_SIG_FIGS: u32 = 5;
/// Width percentages keep a fixed three fractional digits (`62.500`).
pub const WIDTH_PERCENT_FRAC_DIGITS: u32 = 3;

/// A KFX value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A resolved symbol from the shared table.
    Symbol(Sym),
    /// An unresolved symbolic name, resolved to an ID at serialization time.
    SymbolByName(String),
    Dimension(Dimension),
    List(Vec<Value>),
    Struct(ValueMap),
    Blob(Vec<u8>),
}

impl Value {
    pub fn dimension(value: Decimal, unit: Sym) -> Value {
        Value::Dimension(Dimension::new(value, unit))
    }

    pub fn as_dimension(&self) -> Option<&Dimension> {
        match self {
            Value::Dimension(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Sym> {
        match self {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&ValueMap> {
        match self {
            Value::Struct(map) => Some(map),
            _ => None,
        }
    }

    /// Canonical signature encoding. Equal values produce equal encodings;
    /// the style registry relies on this for interning.
    pub fn signature(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => format!("bool:{b}"),
            Value::Int(n) => format!("int:{n}"),
            Value::Float(f) => format!("float:{}", f.to_bits()),
            Value::String(s) => format!("str:{s}"),
            Value::Symbol(s) => format!("sym:{}", s.id()),
            Value::SymbolByName(n) => format!("symname:{n}"),
            Value::Dimension(d) => {
                format!("dec:{}:{}", format_decimal(d.value.normalize()), d.unit.id())
            }
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::signature).collect();
                format!("list:[{}]", inner.join(","))
            }
            Value::Struct(map) => {
                let mut fields: Vec<(u16, String)> = map
                    .iter()
                    .map(|(k, v)| (k.id(), format!("{}={}", k.id(), v.signature())))
                    .collect();
                fields.sort_by_key(|(id, _)| *id);
                let inner: Vec<String> = fields.into_iter().map(|(_, s)| s).collect();
                format!("struct:{{{}}}", inner.join(","))
            }
            Value::Blob(bytes) => format!("blob:{}", bytes.len()),
        }
    }
}

/// A measure with a unit: `{value: 1.5, unit: em}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub value: Decimal,
    pub unit: Sym,
}

impl Dimension {
    pub fn new(value: Decimal, unit: Sym) -> Self {
        Self { value, unit }
    }

    pub fn from_int(value: i64, unit: Sym) -> Self {
        Self::new(Decimal::from(value), unit)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    pub fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(0.0)
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", format_decimal(self.value), self.unit)
    }
}

// ============================================================================
// Property map
// ============================================================================

/// An insertion-ordered property bag keyed by symbol.
///
/// Setting an existing key replaces its value in place, preserving the
/// original position. Emission and signatures sort by numeric ID, so
/// insertion order never leaks into output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMap {
    entries: Vec<(Sym, Value)>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: Sym, value: Value) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: Sym) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn get_dimension(&self, key: Sym) -> Option<&Dimension> {
        self.get(key).and_then(Value::as_dimension)
    }

    pub fn remove(&mut self, key: Sym) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, key: Sym) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Sym, &Value)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Entries sorted by numeric symbol ID, for deterministic emission.
    pub fn sorted(&self) -> Vec<(Sym, &Value)> {
        let mut entries: Vec<(Sym, &Value)> = self.iter().collect();
        entries.sort_by_key(|(k, _)| k.id());
        entries
    }

    /// Overlay `self` on top of `base`: keys present in `self` win.
    pub fn overlaid_on(&self, base: &ValueMap) -> ValueMap {
        let mut result = base.clone();
        for (key, value) in self.iter() {
            result.set(key, value.clone());
        }
        result
    }
}

impl FromIterator<(Sym, Value)> for ValueMap {
    fn from_iter<T: IntoIterator<Item = (Sym, Value)>>(iter: T) -> Self {
        let mut map = ValueMap::new();
        for (key, value) in iter {
            map.set(key, value);
        }
        map
    }
}

// ============================================================================
// Decimal formatting
// ============================================================================

/// Format a decimal the way KP3 writes measure values.
///
/// - Integral values append a bare point: `1` → `"1."`, `100` → `"100."`.
/// - Fractions below one use d-notation with mantissa >= 1 and exponent
///   no smaller than -12: `0.25` → `"2.5d-1"`.
/// - Everything else prints with its stored scale: `62.500` stays
///   `"62.500"`.
pub fn format_decimal(value: Decimal) -> String {
    if value.fract().is_zero() {
        return format!("{}.", value.trunc().normalize());
    }

    let magnitude = value.abs();
    if magnitude < Decimal::ONE {
        let mut mantissa = value;
        let mut exponent = 0i32;
        while mantissa.abs() < Decimal::ONE && exponent > -12 {
            mantissa *= Decimal::TEN;
            exponent -= 1;
        }
        return format!("{}d{}", mantissa.normalize(), exponent);
    }

    value.to_string()
}

/// Parse a decimal in any of the emitted shapes.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if let Some(pos) = text.find(['d', 'D']) {
        let mantissa: Decimal = text[..pos].parse().ok()?;
        let exponent: i32 = text[pos + 1..].parse().ok()?;
        let mut value = mantissa;
        for _ in 0..exponent.unsigned_abs() {
            if exponent < 0 {
                value /= Decimal::TEN;
            } else {
                value *= Decimal::TEN;
            }
        }
        return Some(value);
    }
    if let Some(stripped) = text.strip_suffix('.') {
        return stripped.parse().ok();
    }
    text.parse().ok()
}

/// Round to `figures` significant figures, keeping the value exact.
pub fn round_significant(value: Decimal, figures: u32) -> Decimal {
    value.round_sf(figures).unwrap_or(value)
}

/// Round to a fixed number of fractional digits, keeping trailing zeros.
pub fn round_fractional(value: Decimal, digits: u32) -> Decimal {
    let rounded = value.round_dp(digits);
    // Re-scale so the stored representation carries exactly `digits` places.
    let mut rescaled = rounded;
    rescaled.rescale(digits);
    rescaled
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_format_integral() {
        assert_eq!(format_decimal(dec("1")), "1.");
        assert_eq!(format_decimal(dec("1.0")), "1.");
        assert_eq!(format_decimal(dec("100")), "100.");
        assert_eq!(format_decimal(dec("-3")), "-3.");
        assert_eq!(format_decimal(dec("0")), "0.");
    }

    #[test]
    fn test_format_d_notation() {
        assert_eq!(format_decimal(dec("0.25")), "2.5d-1");
        assert_eq!(format_decimal(dec("0.5")), "5d-1");
        assert_eq!(format_decimal(dec("0.0101")), "1.01d-2");
        assert_eq!(format_decimal(dec("-0.25")), "-2.5d-1");
    }

    #[test]
    fn test_format_plain() {
        assert_eq!(format_decimal(dec("2.6")), "2.6");
        assert_eq!(format_decimal(dec("62.500")), "62.500");
        assert_eq!(format_decimal(dec("1.0101")), "1.0101");
    }

    #[test]
    fn test_parse_round_trip() {
        for text in ["1.", "100.", "2.5d-1", "5d-1", "2.6", "62.500", "-2.5d-1"] {
            let value = parse_decimal(text).unwrap();
            assert_eq!(format_decimal(value), text, "round-trip of {text}");
        }
        assert_eq!(parse_decimal("2.5d-1"), Some(dec("0.25")));
    }

    #[test]
    fn test_round_fractional_keeps_scale() {
        assert_eq!(format_decimal(round_fractional(dec("62.5"), 3)), "62.500");
        assert_eq!(
            format_decimal(round_fractional(dec("63.29113"), 3)),
            "63.291"
        );
    }

    #[test]
    fn test_value_map_set_replaces_in_place() {
        let mut map = ValueMap::new();
        map.set(Sym::MarginTop, Value::Int(1));
        map.set(Sym::MarginBottom, Value::Int(2));
        map.set(Sym::MarginTop, Value::Int(3));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(Sym::MarginTop), Some(&Value::Int(3)));
    }

    #[test]
    fn test_signature_ignores_insertion_order() {
        let mut a = ValueMap::new();
        a.set(Sym::MarginTop, Value::dimension(dec("1"), Sym::Lh));
        a.set(Sym::TextAlign, Value::Symbol(Sym::Center));

        let mut b = ValueMap::new();
        b.set(Sym::TextAlign, Value::Symbol(Sym::Center));
        b.set(Sym::MarginTop, Value::dimension(dec("1"), Sym::Lh));

        assert_eq!(
            Value::Struct(a).signature(),
            Value::Struct(b).signature()
        );
    }
}
