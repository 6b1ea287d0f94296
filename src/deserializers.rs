//! Custom deserializers for forgiving assessment parsing.
//!
//! Assessment payloads come straight from a web form, so ratings may arrive as
//! numbers, numeric strings, blanks or junk. These deserializers never reject a
//! payload over a rating; they hand back `None` and let the risk normalizer
//! apply its default.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserializes a 1-5 rating leniently.
///
/// # Accepted Formats
///
/// * **Numeric**: any JSON number, kept as `f64` (rounding and clamping happen later)
/// * **String numeric**: `"4"` → 4.0, `" 2.5 "` → 2.5
/// * **Anything else** (`null`, `""`, `"high"`, `true`, arrays, objects) → `None`
///
/// # Examples
///
/// ```json
/// { "severity": 4 }
/// { "severity": "4" }
/// { "severity": "not sure" }   // → None, normalized to the midpoint
/// ```
pub fn de_option_rating_forgiving<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(v) = opt else { return Ok(None) };
    Ok(match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Deserializes a free-text field that the form may send as a string or a number
/// (e.g. `numberOfStakeholders: 250` vs `"250"`, or `"100-500"`).
pub fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let opt = Option::<serde_json::Value>::deserialize(deserializer)?;
    match opt {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Deserializes a list of strings, treating `null` as empty.
pub fn de_vec_string_or_null<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserializes an optional value, treating anything that does not fit `T` as absent.
///
/// Used for the generator's optional enrichments: a malformed extra must not
/// cost an otherwise valid narrative.
pub fn de_option_forgiving<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let opt = Option::<Value>::deserialize(deserializer)?;
    Ok(opt.and_then(|v| serde_json::from_value(v).ok()))
}

/// Deserializes a list, keeping the items that fit `T` and dropping the rest.
/// A value that is not a list is treated as absent.
pub fn de_option_vec_skip_invalid<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(Value::Array(items)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let total = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if kept.len() < total {
        tracing::debug!("dropped {} unusable list item(s)", total - kept.len());
    }
    Ok(Some(kept))
}

/// Deserializes a list of strings leniently.
///
/// * `["a", "b"]` → both items; non-string and blank items are dropped
/// * `"a, b"` → one item holding the whole string
/// * anything else → empty
pub fn de_string_list_forgiving<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Rating {
        #[serde(default, deserialize_with = "de_option_rating_forgiving")]
        value: Option<f64>,
    }

    #[derive(Deserialize)]
    struct Count {
        #[serde(default, deserialize_with = "de_string_or_number")]
        value: String,
    }

    fn rating(json: &str) -> Option<f64> {
        serde_json::from_str::<Rating>(json).unwrap().value
    }

    #[test]
    fn rating_accepts_numbers_and_numeric_strings() {
        assert_eq!(rating(r#"{"value": 4}"#), Some(4.0));
        assert_eq!(rating(r#"{"value": 2.6}"#), Some(2.6));
        assert_eq!(rating(r#"{"value": " 5 "}"#), Some(5.0));
    }

    #[test]
    fn rating_swallows_junk() {
        assert_eq!(rating(r#"{}"#), None);
        assert_eq!(rating(r#"{"value": null}"#), None);
        assert_eq!(rating(r#"{"value": "high"}"#), None);
        assert_eq!(rating(r#"{"value": true}"#), None);
        assert_eq!(rating(r#"{"value": [3]}"#), None);
    }

    #[test]
    fn count_accepts_string_or_number() {
        let c: Count = serde_json::from_str(r#"{"value": 250}"#).unwrap();
        assert_eq!(c.value, "250");
        let c: Count = serde_json::from_str(r#"{"value": "100-500"}"#).unwrap();
        assert_eq!(c.value, "100-500");
        let c: Count = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(c.value, "");
        assert!(serde_json::from_str::<Count>(r#"{"value": {}}"#).is_err());
    }

    #[derive(Deserialize)]
    struct Pair {
        a: u8,
    }

    #[derive(Deserialize)]
    struct Lenient {
        #[serde(default, deserialize_with = "de_option_vec_skip_invalid")]
        pairs: Option<Vec<Pair>>,
        #[serde(default, deserialize_with = "de_option_forgiving")]
        single: Option<Pair>,
        #[serde(default, deserialize_with = "de_string_list_forgiving")]
        words: Vec<String>,
    }

    #[test]
    fn list_keeps_only_fitting_items() {
        let v: Lenient =
            serde_json::from_str(r#"{"pairs": [{"a": 1}, null, {"b": 2}, {"a": 3}]}"#).unwrap();
        let kept: Vec<u8> = v.pairs.unwrap().iter().map(|p| p.a).collect();
        assert_eq!(kept, vec![1, 3]);

        let v: Lenient = serde_json::from_str(r#"{"pairs": "nope"}"#).unwrap();
        assert!(v.pairs.is_none());
    }

    #[test]
    fn misfit_optional_is_absent() {
        let v: Lenient = serde_json::from_str(r#"{"single": "x"}"#).unwrap();
        assert!(v.single.is_none());
        let v: Lenient = serde_json::from_str(r#"{"single": {"a": 7}}"#).unwrap();
        assert_eq!(v.single.map(|p| p.a), Some(7));
    }

    #[test]
    fn string_list_accepts_a_bare_string() {
        let v: Lenient = serde_json::from_str(r#"{"words": "anxiety, uncertainty"}"#).unwrap();
        assert_eq!(v.words, vec!["anxiety, uncertainty".to_string()]);
        let v: Lenient = serde_json::from_str(r#"{"words": ["a", 3, " ", "b"]}"#).unwrap();
        assert_eq!(v.words, vec!["a".to_string(), "b".to_string()]);
        let v: Lenient = serde_json::from_str(r#"{"words": {"k": 1}}"#).unwrap();
        assert!(v.words.is_empty());
    }
}
