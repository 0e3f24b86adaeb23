//! Ini-style metadata block embedded in VMJ headers.
//!
//! ```text
//! [CONTOUR_1]
//! POINTS=1024
//! NAME=outer
//! ```
//!
//! Lines before the first `[section]` and lines without a key are ignored.

use std::collections::BTreeMap;
use std::fmt;

/// Attribute key holding the number of points of a section
pub const POINTS_KEY: &str = "POINTS";

/// Attribute value, numeric when the whole value parses as a finite number
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Types an already trimmed value string.
    pub fn parse(raw: &str) -> Value {
        match raw.parse::<f64>() {
            Ok(number) if number.is_finite() => Value::Number(number),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Text(text) => Some(text),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(number) => write!(f, "{number}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

/// Named group of attributes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Section {
    pub id: String,
    pub attributes: BTreeMap<String, Value>,
}

impl Section {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Section {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Sections in file order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataBlock {
    pub sections: Vec<Section>,
}

impl MetadataBlock {
    /// Single pass, line oriented parse.
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if let Some(id) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                sections.push(Section::new(id));
            } else if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                if let Some(current) = sections.last_mut() {
                    current
                        .attributes
                        .insert(key.to_string(), Value::parse(value.trim()));
                }
            }
        }
        MetadataBlock { sections }
    }

    /// Sum of the numeric `POINTS` attributes over all sections
    pub fn point_count(&self) -> u64 {
        let total: f64 = self
            .sections
            .iter()
            .filter_map(|section| section.get(POINTS_KEY).and_then(Value::as_number))
            .sum();
        total as u64
    }

    /// First section named `id`
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_and_points() {
        let block = MetadataBlock::parse("[A]\nPOINTS=10\n[B]\nPOINTS=5\nNAME=foo");
        assert_eq!(block.len(), 2);

        let a = &block.sections[0];
        assert_eq!(a.id, "A");
        assert_eq!(a.attributes.len(), 1);
        assert_eq!(a.get("POINTS"), Some(&Value::Number(10.0)));

        let b = block.section("B").unwrap();
        assert_eq!(b.get("POINTS"), Some(&Value::Number(5.0)));
        assert_eq!(b.get("NAME"), Some(&Value::Text("foo".into())));

        assert_eq!(block.point_count(), 15);
    }

    #[test]
    fn value_typing() {
        assert_eq!(Value::parse("3.5e2"), Value::Number(350.0));
        assert_eq!(Value::parse("-0.25"), Value::Number(-0.25));
        assert_eq!(Value::parse("v1.0"), Value::Text("v1.0".into()));
        assert_eq!(Value::parse(""), Value::Text(String::new()));
        assert_eq!(Value::parse("inf"), Value::Text("inf".into()));
        assert_eq!(Value::parse("NaN"), Value::Text("NaN".into()));
    }

    #[test]
    fn orphan_and_keyless_lines_are_dropped() {
        let text = "VERSION=2\n\r\n[Scan]\r\n=7\n  UNIT = mm \ngarbage\nRANGE=a=b\n";
        let block = MetadataBlock::parse(text);
        assert_eq!(block.len(), 1);
        let scan = &block.sections[0];
        assert_eq!(scan.id, "Scan");
        assert_eq!(scan.attributes.len(), 2);
        assert_eq!(scan.get("UNIT").and_then(Value::as_str), Some("mm"));
        assert_eq!(scan.get("RANGE").and_then(Value::as_str), Some("a=b"));
    }

    #[test]
    fn ids_and_keys_are_verbatim() {
        let block = MetadataBlock::parse("[layer one]\npoints=3\nPOINTS=4\n[]\n");
        assert_eq!(block.sections[0].id, "layer one");
        assert_eq!(block.sections[1].id, "");
        assert_eq!(block.point_count(), 4);
        assert_eq!(
            block.sections[0].get("points").and_then(Value::as_number),
            Some(3.0)
        );
    }

    #[test]
    fn empty_text() {
        let block = MetadataBlock::parse("");
        assert!(block.is_empty());
        assert_eq!(block.point_count(), 0);
    }
}
