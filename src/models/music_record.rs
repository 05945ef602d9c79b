use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of a library's content file. All fields are free text; cells
/// written as numbers or booleans by spreadsheet exports are read as text.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MusicRecord {
    #[serde(rename = "Nr", alias = "number", default, deserialize_with = "free_text")]
    pub number: String,
    #[serde(rename = "Titel", alias = "title", default, deserialize_with = "free_text")]
    pub title: String,
    #[serde(rename = "Komponist", alias = "composer", default, deserialize_with = "free_text")]
    pub composer: String,
    #[serde(rename = "Arrangeur", alias = "arranger", default, deserialize_with = "free_text")]
    pub arranger: String,
}

/// Any JSON scalar as a string. `null` is empty; whole floats such as
/// `12.0` drop the fraction.
fn free_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => Ok(format!("{}", f as i64)),
            _ => Ok(n.to_string()),
        },
        other => Err(de::Error::custom(format!("expected a text cell, found {}", other))),
    }
}
