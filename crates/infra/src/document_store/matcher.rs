//! Filter and sort evaluation over JSON documents.
//!
//! Request filters arrive as strings; each is cast to the type of the stored
//! value it is compared with. A value that cannot be cast is a
//! [`QueryError::Cast`]. Stored RFC 3339 strings compare as instants. A filter
//! on an array field matches when any element matches. Missing fields never
//! match.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use natours_core::{ComparisonOp, Condition, Direction, FieldFilter, QueryError, SortKey};

enum Test<'a> {
    Eq(&'a Value),
    Cmp(ComparisonOp, &'a Value),
}

struct CompiledFilter<'a> {
    field: &'a str,
    tests: Vec<Test<'a>>,
}

/// A filter set with every operator token resolved.
pub struct Matcher<'a> {
    filters: Vec<CompiledFilter<'a>>,
}

impl<'a> Matcher<'a> {
    /// Fails on the first operator token the engine does not support.
    pub fn compile(filters: &'a [FieldFilter]) -> Result<Self, QueryError> {
        let filters = filters
            .iter()
            .map(|filter| {
                let tests = match &filter.condition {
                    Condition::Eq(value) => vec![Test::Eq(value)],
                    cond @ Condition::Operators(_) => cond
                        .comparisons()?
                        .into_iter()
                        .map(|(op, value)| Test::Cmp(op, value))
                        .collect(),
                };
                Ok(CompiledFilter {
                    field: filter.field.as_str(),
                    tests,
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        Ok(Self { filters })
    }

    pub fn matches(&self, doc: &Value) -> Result<bool, QueryError> {
        for filter in &self.filters {
            let Some(stored) = lookup(doc, filter.field) else {
                return Ok(false);
            };
            for test in &filter.tests {
                if !test_value(filter.field, stored, test)? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

fn test_value(field: &str, stored: &Value, test: &Test<'_>) -> Result<bool, QueryError> {
    if let Value::Array(items) = stored {
        for item in items {
            if test_value(field, item, test)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    match test {
        Test::Eq(wanted) => {
            if stored == *wanted {
                return Ok(true);
            }
            Ok(compare_cast(field, stored, wanted)? == Some(Ordering::Equal))
        }
        Test::Cmp(op, wanted) => Ok(compare_cast(field, stored, wanted)?
            .map(|ordering| op.accepts(ordering))
            .unwrap_or(false)),
    }
}

/// Compare `stored` with `wanted` cast to the stored value's type.
///
/// `Ok(None)` means the two are not comparable, which never matches.
fn compare_cast(field: &str, stored: &Value, wanted: &Value) -> Result<Option<Ordering>, QueryError> {
    let cast_error = || QueryError::Cast {
        field: field.to_string(),
        value: match wanted {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };

    match (stored, wanted) {
        (Value::Number(a), Value::Number(b)) => Ok(cmp_f64(a.as_f64(), b.as_f64())),
        (Value::Number(a), Value::String(b)) => {
            let b: f64 = b.trim().parse().map_err(|_| cast_error())?;
            Ok(cmp_f64(a.as_f64(), Some(b)))
        }
        (Value::Bool(a), Value::Bool(b)) => Ok(Some(a.cmp(b))),
        (Value::Bool(a), Value::String(b)) => {
            let b: bool = b.trim().parse().map_err(|_| cast_error())?;
            Ok(Some(a.cmp(&b)))
        }
        (Value::String(a), Value::String(b)) => match stored_instant(a) {
            Some(a) => {
                let b = parse_instant(b).ok_or_else(cast_error)?;
                Ok(Some(a.cmp(&b)))
            }
            None => Ok(Some(a.as_str().cmp(b.as_str()))),
        },
        _ => Ok(None),
    }
}

fn cmp_f64(a: Option<f64>, b: Option<f64>) -> Option<Ordering> {
    a?.partial_cmp(&b?)
}

/// Stored timestamps are always full RFC 3339.
fn stored_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

/// Filter values may also be plain dates (`2021-01-01` is midnight UTC).
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    stored_instant(s).or_else(|| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|n| n.and_utc())
    })
}

/// Resolve a dotted path (`startLocation.address`) inside a document.
pub fn lookup<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

/// Order two documents by the given keys. Ties keep their existing order.
pub fn compare_documents(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = compare_values(lookup(a, &key.field), lookup(b, &key.field));
        let ordering = match key.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Cross-type ordering: missing/null < numbers < strings < objects < arrays < booleans.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (stored_instant(x), stored_instant(y)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ (Value::Object(_) | Value::Array(_))), Some(y)) if type_rank(a) == type_rank(b) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn string_filter(field: &str, token: &str, value: &str) -> FieldFilter {
        FieldFilter {
            field: field.to_string(),
            condition: Condition::Operators(vec![(token.to_string(), Value::String(value.into()))]),
        }
    }

    fn check(filters: &[FieldFilter], doc: &Value) -> Result<bool, QueryError> {
        Matcher::compile(filters)?.matches(doc)
    }

    #[test]
    fn string_filter_is_cast_to_number() {
        let doc = json!({"price": 497});
        assert!(check(&[string_filter("price", "$gte", "497")], &doc).unwrap());
        assert!(!check(&[string_filter("price", "$gt", "497")], &doc).unwrap());
        assert!(check(&[FieldFilter::eq("price", "497")], &doc).unwrap());
    }

    #[test]
    fn uncastable_value_is_a_cast_error() {
        let doc = json!({"price": 497});
        assert_eq!(
            check(&[string_filter("price", "$gte", "cheap")], &doc),
            Err(QueryError::Cast {
                field: "price".into(),
                value: "cheap".into()
            })
        );
    }

    #[test]
    fn unknown_operator_fails_at_compile_time() {
        let filters = [string_filter("price", "$regex", "4")];
        assert!(matches!(
            Matcher::compile(&filters),
            Err(QueryError::UnsupportedOperator(op)) if op == "$regex"
        ));
    }

    #[test]
    fn missing_field_never_matches() {
        let doc = json!({"name": "x"});
        assert!(!check(&[string_filter("price", "$lt", "10")], &doc).unwrap());
    }

    #[test]
    fn arrays_match_on_any_element() {
        let doc = json!({"startDates": ["2021-04-25T09:00:00Z", "2021-07-20T09:00:00Z"]});
        assert!(check(&[string_filter("startDates", "$gte", "2021-07-01")], &doc).unwrap());
        assert!(!check(&[string_filter("startDates", "$gte", "2022-01-01")], &doc).unwrap());
    }

    #[test]
    fn booleans_cast_from_strings() {
        let doc = json!({"active": true});
        assert!(check(&[FieldFilter::eq("active", "true")], &doc).unwrap());
        assert!(check(&[FieldFilter::eq("active", true)], &doc).unwrap());
        assert!(check(&[FieldFilter::eq("active", "yes")], &doc).is_err());
    }

    #[test]
    fn all_filters_must_hold() {
        let doc = json!({"difficulty": "easy", "duration": 5});
        let filters = [
            FieldFilter::eq("difficulty", "easy"),
            string_filter("duration", "$gte", "7"),
        ];
        assert!(!check(&filters, &doc).unwrap());
    }

    #[test]
    fn nested_paths_resolve() {
        let doc = json!({"startLocation": {"address": "Miami"}});
        assert_eq!(lookup(&doc, "startLocation.address"), Some(&json!("Miami")));
        assert_eq!(lookup(&doc, "startLocation.city"), None);
    }

    #[test]
    fn sort_by_multiple_keys() {
        let mut docs = vec![
            json!({"name": "b", "price": 10}),
            json!({"name": "a", "price": 20}),
            json!({"name": "c", "price": 10}),
            json!({"name": "d"}),
        ];
        let keys = [SortKey::asc("price"), SortKey::desc("name")];
        docs.sort_by(|a, b| compare_documents(a, b, &keys));

        let names: Vec<_> = docs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn timestamps_sort_as_instants() {
        let mut docs = vec![
            json!({"createdAt": "2021-04-25T09:00:00Z"}),
            json!({"createdAt": "2021-04-25T09:00:00.500Z"}),
        ];
        docs.sort_by(|a, b| compare_documents(a, b, &[SortKey::desc("createdAt")]));
        assert_eq!(docs[0]["createdAt"], "2021-04-25T09:00:00.500Z");
    }
}
