//! Query handle and the request-to-query feature builder.
//!
//! [`DocumentQuery`] is the abstract, mutable handle over a collection: filter
//! conditions, sort keys, projection and pagination composed before a store
//! executes it. [`ApiFeatures`] fills a handle from raw request parameters:
//!
//! ```text
//! ?difficulty=easy&price[gte]=500&sort=-price,name&fields=name,price&page=2&limit=10
//!   filter()   -> difficulty == "easy", price $gte "500"
//!   sort()     -> price desc, name asc
//!   select()   -> include [name, price], exclude [__v]
//!   paginate() -> skip 10, limit 10
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::params::{ParamValue, QueryParams};

/// Internal per-document write counter. Never part of an API projection.
pub const REVISION_FIELD: &str = "__v";

/// Field every collection is ordered by when the request names no sort.
pub const CREATED_AT_FIELD: &str = "createdAt";

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 100;

/// Parameters that drive sorting, projection and pagination rather than filtering.
pub const RESERVED_PARAMS: [&str; 5] = ["sort", "page", "limit", "select", "fields"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The filter named an operator the engine does not understand.
    #[error("Invalid query operator: {0}")]
    UnsupportedOperator(String),

    /// A filter value could not be coerced to the stored field's type.
    #[error("Invalid {field}: {value}")]
    Cast { field: String, value: String },
}

/// Ordered comparison operators understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOp {
    /// Parse the request-side suffix (`gte` in `price[gte]`).
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }

    /// Engine-side operator token.
    pub fn token(self) -> &'static str {
        match self {
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    /// Does `ordering` (stored value compared to the filter value) satisfy this operator?
    pub fn accepts(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Self::Gt => ordering == Greater,
            Self::Gte => ordering != Less,
            Self::Lt => ordering == Less,
            Self::Lte => ordering != Greater,
        }
    }
}

/// Condition applied to a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Plain equality.
    Eq(Value),
    /// Operator mapping as handed to the engine. Tokens are not validated here.
    Operators(Vec<(String, Value)>),
}

impl Condition {
    /// Resolve operator tokens, failing on the first one the engine does not know.
    pub fn comparisons(&self) -> Result<Vec<(ComparisonOp, &Value)>, QueryError> {
        match self {
            Condition::Eq(_) => Ok(Vec::new()),
            Condition::Operators(ops) => ops
                .iter()
                .map(|(token, value)| {
                    ComparisonOp::from_token(token)
                        .map(|op| (op, value))
                        .ok_or_else(|| QueryError::UnsupportedOperator(token.clone()))
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub condition: Condition,
}

impl FieldFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Eq(value.into()),
        }
    }

    pub fn compare(field: impl Into<String>, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Operators(vec![(op.token().to_string(), value.into())]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// `-price` -> price descending, `name` -> name ascending.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        match token.strip_prefix('-') {
            Some(field) if !field.is_empty() => Some(Self::desc(field)),
            Some(_) => None,
            None if !token.is_empty() => Some(Self::asc(token)),
            None => None,
        }
    }
}

/// Field selection applied to every returned document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    include: Vec<String>,
    exclude: Vec<String>,
    hidden: Vec<String>,
}

impl Projection {
    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn hidden(&self) -> &[String] {
        &self.hidden
    }

    /// Shape a document. `id` survives an inclusion list; hidden fields are only
    /// returned when explicitly included; exclusions always win.
    pub fn apply(&self, doc: Value) -> Value {
        let Value::Object(mut map) = doc else {
            return doc;
        };

        if self.include.is_empty() {
            map.retain(|key, _| !self.hidden.iter().any(|h| h == key));
        } else {
            map.retain(|key, _| key == "id" || self.include.iter().any(|i| i == key));
        }
        map.retain(|key, _| !self.exclude.iter().any(|e| e == key));

        Value::Object(map)
    }
}

/// Abstract query handle over a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    filters: Vec<FieldFilter>,
    sort: Vec<SortKey>,
    projection: Projection,
    skip: u64,
    limit: Option<u64>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append filter conditions (all conditions must hold).
    pub fn find(mut self, filters: impl IntoIterator<Item = FieldFilter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.find([FieldFilter::eq(field, value)])
    }

    /// Replace the sort order.
    pub fn sort_by(mut self, keys: Vec<SortKey>) -> Self {
        self.sort = keys;
        self
    }

    pub fn select(mut self, fields: impl IntoIterator<Item = String>) -> Self {
        self.projection.include.extend(fields);
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.projection.exclude.contains(&field) {
            self.projection.exclude.push(field);
        }
        self
    }

    /// Mark a field as returned only on explicit request.
    pub fn hide(mut self, field: impl Into<String>) -> Self {
        self.projection.hidden.push(field.into());
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = n;
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn skip_count(&self) -> u64 {
        self.skip
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }

    /// Detach the projection, for callers that shape documents after decoding them.
    pub fn split_projection(mut self) -> (DocumentQuery, Projection) {
        let projection = std::mem::take(&mut self.projection);
        (self, projection)
    }
}

/// Fluent builder applying request parameters to a query handle.
pub struct ApiFeatures<'a> {
    query: DocumentQuery,
    params: &'a QueryParams,
}

impl<'a> ApiFeatures<'a> {
    pub fn new(query: DocumentQuery, params: &'a QueryParams) -> Self {
        Self { query, params }
    }

    /// Apply every non-reserved parameter as a filter.
    pub fn filter(mut self) -> Self {
        let mut working = self.params.clone();
        for key in RESERVED_PARAMS {
            working.remove(key);
        }

        let filters = working.into_iter().map(|(field, value)| FieldFilter {
            field,
            condition: match value {
                ParamValue::Scalar(s) => Condition::Eq(Value::String(s)),
                ParamValue::Map(ops) => Condition::Operators(
                    ops.into_iter()
                        .map(|(op, v)| (translate_operator(op), Value::String(v)))
                        .collect(),
                ),
            },
        });

        self.query = self.query.find(filters);
        self
    }

    pub fn sort(mut self) -> Self {
        let keys: Vec<SortKey> = self
            .params
            .scalar("sort")
            .map(|s| s.split(',').filter_map(SortKey::parse).collect())
            .unwrap_or_default();

        let keys = if keys.is_empty() {
            vec![SortKey::desc(CREATED_AT_FIELD)]
        } else {
            keys
        };

        self.query = self.query.sort_by(keys);
        self
    }

    pub fn select(mut self) -> Self {
        let requested = self
            .params
            .scalar("select")
            .or_else(|| self.params.scalar("fields"));

        if let Some(list) = requested {
            let mut include = Vec::new();
            for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                match token.strip_prefix('-') {
                    Some(field) if !field.is_empty() => {
                        self.query = self.query.exclude(field);
                    }
                    Some(_) => {}
                    None => include.push(token.to_string()),
                }
            }
            self.query = self.query.select(include);
        }

        self.query = self.query.exclude(REVISION_FIELD);
        self
    }

    pub fn paginate(mut self) -> Self {
        let page = positive_int(self.params.scalar("page")).unwrap_or(DEFAULT_PAGE);
        let limit = positive_int(self.params.scalar("limit")).unwrap_or(DEFAULT_LIMIT);
        let skip = (page - 1).saturating_mul(limit);

        self.query = self.query.skip(skip).limit(limit);
        self
    }

    pub fn query(&self) -> &DocumentQuery {
        &self.query
    }

    pub fn into_query(self) -> DocumentQuery {
        self.query
    }
}

fn translate_operator(suffix: String) -> String {
    match ComparisonOp::from_suffix(&suffix) {
        Some(op) => op.token().to_string(),
        None => suffix,
    }
}

/// Integer coercion for `page`/`limit`: absent, non-numeric or zero yields `None`.
fn positive_int(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    let n = raw
        .parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 1.0).map(|f| f as u64))?;
    (n > 0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn build(pairs: &[(&str, &str)]) -> DocumentQuery {
        let params = QueryParams::from_pairs(pairs.iter().copied());
        ApiFeatures::new(DocumentQuery::new(), &params)
            .filter()
            .sort()
            .select()
            .paginate()
            .into_query()
    }

    #[test]
    fn reserved_keys_never_become_filters() {
        let q = build(&[
            ("sort", "price"),
            ("page", "2"),
            ("limit", "5"),
            ("select", "name"),
            ("fields", "price"),
            ("difficulty", "easy"),
        ]);

        assert_eq!(q.filters(), &[FieldFilter::eq("difficulty", "easy")]);
    }

    #[test]
    fn comparison_suffixes_are_rewritten_to_engine_tokens() {
        let q = build(&[("price[gte]", "500"), ("duration[lt]", "10")]);

        let price = q.filters().iter().find(|f| f.field == "price").unwrap();
        assert_eq!(
            price.condition,
            Condition::Operators(vec![("$gte".to_string(), json!("500"))])
        );
        let resolved = price.condition.comparisons().unwrap();
        assert_eq!(resolved, vec![(ComparisonOp::Gte, &json!("500"))]);

        let duration = q.filters().iter().find(|f| f.field == "duration").unwrap();
        assert_eq!(
            duration.condition.comparisons().unwrap()[0].0,
            ComparisonOp::Lt
        );
    }

    #[test]
    fn unknown_operators_pass_through_and_fail_at_resolution() {
        let q = build(&[("price[regex]", "^1")]);
        let err = q.filters()[0].condition.comparisons().unwrap_err();
        assert_eq!(err, QueryError::UnsupportedOperator("regex".to_string()));
    }

    #[test]
    fn sort_defaults_to_newest_first() {
        let q = build(&[]);
        assert_eq!(q.sort_keys(), &[SortKey::desc("createdAt")]);
    }

    #[test]
    fn sort_splits_on_commas_and_honours_minus() {
        let q = build(&[("sort", "-ratingsAverage,price")]);
        assert_eq!(
            q.sort_keys(),
            &[SortKey::desc("ratingsAverage"), SortKey::asc("price")]
        );
    }

    #[test]
    fn select_always_drops_revision_field() {
        let q = build(&[("fields", "name,price,__v")]);
        assert_eq!(q.projection().include(), &["name", "price", "__v"]);
        assert!(q.projection().exclude().iter().any(|f| f == REVISION_FIELD));

        let shaped = q
            .projection()
            .apply(json!({"id": "1", "name": "A", "price": 1, "__v": 3, "summary": "x"}));
        assert_eq!(shaped, json!({"id": "1", "name": "A", "price": 1}));
    }

    #[test]
    fn select_without_request_still_excludes_revision_and_hidden_fields() {
        let params = QueryParams::new();
        let q = ApiFeatures::new(DocumentQuery::new().hide("createdAt"), &params)
            .select()
            .into_query();
        let shaped = q
            .projection()
            .apply(json!({"id": "1", "name": "A", "__v": 0, "createdAt": "2024-01-01T00:00:00Z"}));
        assert_eq!(shaped, json!({"id": "1", "name": "A"}));
    }

    #[test]
    fn paginate_defaults() {
        let q = build(&[]);
        assert_eq!(q.skip_count(), 0);
        assert_eq!(q.limit_count(), Some(100));
    }

    #[test]
    fn paginate_page_three_of_ten() {
        let q = build(&[("page", "3"), ("limit", "10")]);
        assert_eq!(q.skip_count(), 20);
        assert_eq!(q.limit_count(), Some(10));
    }

    #[test]
    fn paginate_ignores_non_numeric_and_zero() {
        let q = build(&[("page", "abc"), ("limit", "0")]);
        assert_eq!(q.skip_count(), 0);
        assert_eq!(q.limit_count(), Some(100));
    }

    proptest! {
        #[test]
        fn filter_stage_excludes_reserved_keys(
            extra in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,6}", 0..6),
            sort in "[a-z,-]{0,10}",
            page in "[0-9]{0,3}",
            limit in "[0-9]{0,3}",
            select in "[a-z,]{0,10}",
        ) {
            let mut pairs: Vec<(String, String)> = extra.into_iter().collect();
            pairs.push(("sort".into(), sort));
            pairs.push(("page".into(), page));
            pairs.push(("limit".into(), limit));
            pairs.push(("select".into(), select));
            let params = QueryParams::from_pairs(pairs);

            let q = ApiFeatures::new(DocumentQuery::new(), &params).filter().into_query();
            for f in q.filters() {
                prop_assert!(!RESERVED_PARAMS.contains(&f.field.as_str()));
            }
        }
    }
}
