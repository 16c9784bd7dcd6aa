//! KFX fragments.
//!
//! A KFX book is a flat sequence of typed fragments (styles, storylines,
//! resources, anchors). The engine stays in this in-memory representation;
//! packing fragments into the binary container is a separate concern.

use crate::kfx::symbol::Sym;
use crate::kfx::value::{Value, format_decimal};

/// A top-level typed record in KFX output.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Fragment type (`style`, `storyline`, `external-resource`, ...).
    pub ftype: Sym,
    /// Fragment name, unique within its type.
    pub name: String,
    pub value: Value,
}

impl Fragment {
    pub fn new(ftype: Sym, name: impl Into<String>, value: Value) -> Self {
        Self {
            ftype,
            name: name.into(),
            value,
        }
    }
}

/// Ordered fragment sequence produced by one conversion.
#[derive(Debug, Default, Clone)]
pub struct FragmentList {
    fragments: Vec<Fragment>,
}

impl FragmentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn of_type(&self, ftype: Sym) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter().filter(move |f| f.ftype == ftype)
    }

    pub fn find(&self, ftype: Sym, name: &str) -> Option<&Fragment> {
        self.fragments
            .iter()
            .find(|f| f.ftype == ftype && f.name == name)
    }

    /// Render every fragment as Ion-like text, one per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            out.push_str(fragment.ftype.name());
            out.push(' ');
            out.push_str(&fragment.name);
            out.push_str(": ");
            write_value(&mut out, &fragment.value);
            out.push('\n');
        }
        out
    }
}

impl IntoIterator for FragmentList {
    type Item = Fragment;
    type IntoIter = std::vec::IntoIter<Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.into_iter()
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(f) => out.push_str(&format!("{f}")),
        Value::String(s) => {
            out.push('"');
            out.push_str(&s.replace('\\', "\\\\").replace('"', "\\\""));
            out.push('"');
        }
        Value::Symbol(sym) => out.push_str(sym.name()),
        Value::SymbolByName(name) => out.push_str(name),
        Value::Dimension(d) => {
            out.push_str("{value: ");
            out.push_str(&format_decimal(d.value));
            out.push_str(", unit: ");
            out.push_str(d.unit.name());
            out.push('}');
        }
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Struct(map) => {
            out.push('{');
            for (i, (key, field)) in map.sorted().into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(key.name());
                out.push_str(": ");
                write_value(out, field);
            }
            out.push('}');
        }
        Value::Blob(bytes) => {
            out.push_str(&format!("{{{{ {} bytes }}}}", bytes.len()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kfx::value::ValueMap;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_dump_dimension_format() {
        let mut props = ValueMap::new();
        props.set(
            Sym::LineHeight,
            Value::dimension(Decimal::from_str("0.25").unwrap(), Sym::Lh),
        );
        let mut fragments = FragmentList::new();
        fragments.push(Fragment::new(Sym::Style, "s1J", Value::Struct(props)));

        let dump = fragments.dump();
        assert_eq!(dump, "style s1J: {line-height: {value: 2.5d-1, unit: lh}}\n");
    }

    #[test]
    fn test_dump_sorts_struct_fields_by_id() {
        let mut props = ValueMap::new();
        props.set(Sym::TextAlign, Value::Symbol(Sym::Center)); // id 34
        props.set(Sym::FontSize, Value::dimension(Decimal::ONE, Sym::Em)); // id 16
        let mut fragments = FragmentList::new();
        fragments.push(Fragment::new(Sym::Style, "s1K", Value::Struct(props)));

        let dump = fragments.dump();
        let font = dump.find("font-size").unwrap();
        let align = dump.find("text-align").unwrap();
        assert!(font < align);
    }
}
