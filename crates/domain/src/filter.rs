use mivaapi_core::{ApiError, ApiResult};
use serde_json::{Map, Value};

/// Search operators that carry their comparison in the operator itself and
/// therefore accept a missing `value` (case-insensitive match).
const NULL_OPERATORS: [&str; 3] = ["TRUE", "FALSE", "NULL"];

/// Derives the serialized name of a "show" filter from its owner function.
///
/// The observed server convention strips a trailing `List_Load_Query` from
/// the function name and appends `_Show`, e.g. `CategoryList_Load_Query`
/// becomes `Category_Show`. Servers with a different scheme can bypass this
/// via [`Filter::show_named`].
#[must_use]
pub fn show_filter_name(function_name: &str) -> String {
    let base = function_name
        .strip_suffix("List_Load_Query")
        .filter(|stripped| !stripped.is_empty())
        .unwrap_or(function_name);

    format!("{base}_Show")
}

/// One clause of a "search" filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchClause {
    field: String,
    operator: String,
    value: Option<Value>,
}

impl SearchClause {
    /// Creates a validated search clause.
    ///
    /// `value` is required unless `operator` is one of the null-accepting
    /// operators (`TRUE`, `FALSE`, `NULL`, case-insensitive).
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: Option<Value>,
    ) -> ApiResult<Self> {
        let field = field.into();
        let operator = operator.into();

        if field.trim().is_empty() {
            return Err(ApiError::MissingRequiredValue(
                "missing required search filter property \"field\"".to_owned(),
            ));
        }

        if operator.trim().is_empty() {
            return Err(ApiError::MissingRequiredValue(
                "missing required search filter property \"operator\"".to_owned(),
            ));
        }

        let value = value.filter(|value| !value.is_null());

        if value.is_none() && !is_null_operator(&operator) {
            return Err(ApiError::MissingRequiredValue(
                "missing required search filter property \"value\"".to_owned(),
            ));
        }

        Ok(Self {
            field,
            operator,
            value,
        })
    }

    fn from_object(clause: &Map<String, Value>) -> ApiResult<Self> {
        let field = clause
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ApiError::MissingRequiredValue(
                    "missing required search filter property \"field\"".to_owned(),
                )
            })?;
        let operator = clause
            .get("operator")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ApiError::MissingRequiredValue(
                    "missing required search filter property \"operator\"".to_owned(),
                )
            })?;

        Self::new(field, operator, clause.get("value").cloned())
    }

    /// Returns the searched field name.
    #[must_use]
    pub fn field(&self) -> &str {
        self.field.as_str()
    }

    /// Returns the search operator.
    #[must_use]
    pub fn operator(&self) -> &str {
        self.operator.as_str()
    }

    /// Returns the comparison value, if the operator requires one.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    fn to_value(&self) -> Value {
        let mut clause = Map::new();
        clause.insert("field".to_owned(), Value::String(self.field.clone()));
        clause.insert("operator".to_owned(), Value::String(self.operator.clone()));

        if let Some(value) = &self.value {
            clause.insert("value".to_owned(), value.clone());
        }

        Value::Object(clause)
    }
}

fn is_null_operator(operator: &str) -> bool {
    let operator = operator.to_uppercase();
    NULL_OPERATORS.iter().any(|null_op| *null_op == operator)
}

/// The canonical form of a filter value, one variant per filter kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// Any filter name without special handling; the value passes through.
    Generic(Value),
    /// A `search` filter: one or more field/operator/value clauses.
    Search(Vec<SearchClause>),
    /// An `ondemandcolumns` filter: a list of column names.
    OnDemandColumns(Vec<String>),
    /// A `show` filter, namespaced to the function it modifies.
    Show(Value),
}

/// A classified, validated filter ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: String,
    kind: FilterKind,
}

impl Filter {
    /// Classifies a named filter value into its canonical form.
    ///
    /// Classification is case-insensitive on the trimmed name: `search`,
    /// `ondemandcolumns`, and `show` receive kind-specific validation;
    /// everything else becomes a generic filter. `owner_function` is
    /// required for `show` filters, whose serialized name is derived from
    /// the function they modify.
    pub fn classify(
        name: &str,
        value: Value,
        owner_function: Option<&str>,
    ) -> ApiResult<Self> {
        let name = name.trim();

        if name.is_empty() {
            return Err(ApiError::InvalidValue(
                "filter name must not be blank".to_owned(),
            ));
        }

        if is_blank_value(&value) {
            return Err(ApiError::InvalidValue(format!(
                "filter \"{name}\" has a blank value"
            )));
        }

        match name.to_lowercase().as_str() {
            "search" => Ok(Self {
                name: name.to_owned(),
                kind: FilterKind::Search(parse_search_clauses(value)?),
            }),
            "ondemandcolumns" => Ok(Self {
                name: name.to_owned(),
                kind: FilterKind::OnDemandColumns(parse_column_list(name, value)?),
            }),
            "show" => {
                let function_name = owner_function.ok_or_else(|| {
                    ApiError::MissingRequiredValue(
                        "function name is required for show filters".to_owned(),
                    )
                })?;

                Ok(Self {
                    name: show_filter_name(function_name),
                    kind: FilterKind::Show(value),
                })
            }
            _ => Ok(Self {
                name: name.to_owned(),
                kind: FilterKind::Generic(value),
            }),
        }
    }

    /// Creates a show filter with an explicitly chosen serialized name,
    /// for servers whose naming scheme differs from [`show_filter_name`].
    pub fn show_named(name: &str, value: Value) -> ApiResult<Self> {
        let name = name.trim();

        if name.is_empty() {
            return Err(ApiError::InvalidValue(
                "filter name must not be blank".to_owned(),
            ));
        }

        if is_blank_value(&value) {
            return Err(ApiError::InvalidValue(format!(
                "filter \"{name}\" has a blank value"
            )));
        }

        Ok(Self {
            name: name.to_owned(),
            kind: FilterKind::Show(value),
        })
    }

    /// Returns the serialized filter name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the classified filter kind.
    #[must_use]
    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    /// Serializes the filter to its `{name, value}` wire form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let value = match &self.kind {
            FilterKind::Generic(value) | FilterKind::Show(value) => value.clone(),
            FilterKind::Search(clauses) => {
                Value::Array(clauses.iter().map(SearchClause::to_value).collect())
            }
            FilterKind::OnDemandColumns(columns) => Value::Array(
                columns
                    .iter()
                    .map(|column| Value::String(column.clone()))
                    .collect(),
            ),
        };

        let mut filter = Map::new();
        filter.insert("name".to_owned(), Value::String(self.name.clone()));
        filter.insert("value".to_owned(), value);

        Value::Object(filter)
    }
}

/// Determines whether a filter value is blank.
///
/// Null, whitespace-only strings, and empty collections are blank; booleans
/// and numbers never are.
#[must_use]
pub fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
    }
}

fn parse_search_clauses(value: Value) -> ApiResult<Vec<SearchClause>> {
    match value {
        // A bare clause object is shorthand for a one-element clause list.
        Value::Object(clause) => Ok(vec![SearchClause::from_object(&clause)?]),
        Value::Array(clauses) => clauses
            .iter()
            .map(|clause| {
                clause
                    .as_object()
                    .ok_or_else(|| {
                        ApiError::MissingRequiredValue(
                            "search filter clauses must be objects".to_owned(),
                        )
                    })
                    .and_then(SearchClause::from_object)
            })
            .collect(),
        _ => Err(ApiError::MissingRequiredValue(
            "search filter value must be an array".to_owned(),
        )),
    }
}

fn parse_column_list(name: &str, value: Value) -> ApiResult<Vec<String>> {
    let Value::Array(columns) = value else {
        return Err(ApiError::InvalidValue(format!(
            "filter \"{name}\" requires a list of column names"
        )));
    };

    Ok(columns.into_iter().map(stringify_column).collect())
}

fn stringify_column(column: Value) -> String {
    match column {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Filter, FilterKind, SearchClause, is_blank_value, show_filter_name};

    #[test]
    fn search_filter_normalizes_a_single_clause() {
        let filter = Filter::classify(
            "search",
            json!({"field": "code", "operator": "EQ", "value": "SKU"}),
            None,
        )
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(
            filter.to_value(),
            json!({
                "name": "search",
                "value": [{"field": "code", "operator": "EQ", "value": "SKU"}],
            })
        );
    }

    #[test]
    fn search_filter_keeps_clause_order() {
        let filter = Filter::classify(
            "search",
            json!([
                {"field": "code", "operator": "EQ", "value": "SKU"},
                {"field": "price", "operator": "GT", "value": 10},
            ]),
            None,
        )
        .unwrap_or_else(|_| unreachable!());

        let FilterKind::Search(clauses) = filter.kind() else {
            panic!("expected a search filter");
        };

        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].field(), "code");
        assert_eq!(clauses[1].field(), "price");
    }

    #[test]
    fn search_clause_requires_value_for_comparison_operators() {
        let result = Filter::classify(
            "search",
            json!([{"field": "code", "operator": "EQ"}]),
            None,
        );

        assert!(result.is_err());
    }

    #[test]
    fn search_clause_allows_missing_value_for_null_operators() {
        let clause = SearchClause::new("ship_date", "NULL", None).unwrap_or_else(|_| unreachable!());

        assert_eq!(clause.operator(), "NULL");
        assert!(clause.value().is_none());
    }

    #[test]
    fn null_operator_check_is_case_insensitive() {
        assert!(SearchClause::new("active", "true", None).is_ok());
        assert!(SearchClause::new("active", "eq", None).is_err());
    }

    #[test]
    fn on_demand_columns_stringifies_elements() {
        let filter =
            Filter::classify("ondemandcolumns", json!(["price", 2, true]), None).unwrap_or_else(|_| unreachable!());

        assert_eq!(
            filter.to_value(),
            json!({"name": "ondemandcolumns", "value": ["price", "2", "true"]})
        );
    }

    #[test]
    fn show_filter_requires_an_owner_function() {
        let result = Filter::classify("show", json!("Active"), None);

        assert!(result.is_err());
    }

    #[test]
    fn show_filter_is_namespaced_to_its_owner() {
        let filter =
            Filter::classify("show", json!("Active"), Some("CategoryList_Load_Query")).unwrap_or_else(|_| unreachable!());

        assert_eq!(
            filter.to_value(),
            json!({"name": "Category_Show", "value": "Active"})
        );
    }

    #[test]
    fn show_filter_name_keeps_unrecognized_functions_whole() {
        assert_eq!(show_filter_name("Product_Insert"), "Product_Insert_Show");
        assert_eq!(show_filter_name("List_Load_Query"), "List_Load_Query_Show");
    }

    #[test]
    fn generic_filter_passes_the_value_through() {
        let filter = Filter::classify("Category_Code", json!("tools"), None).unwrap_or_else(|_| unreachable!());

        assert_eq!(
            filter.to_value(),
            json!({"name": "Category_Code", "value": "tools"})
        );
    }

    #[test]
    fn classification_is_case_insensitive_on_the_name() {
        let filter = Filter::classify(
            "Search",
            json!({"field": "code", "operator": "EQ", "value": "a"}),
            None,
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(matches!(filter.kind(), FilterKind::Search(_)));
        assert_eq!(filter.name(), "Search");
    }

    #[test]
    fn blank_names_and_values_are_rejected() {
        assert!(Filter::classify("  ", json!("x"), None).is_err());
        assert!(Filter::classify("f", json!(null), None).is_err());
        assert!(Filter::classify("f", json!(""), None).is_err());
        assert!(Filter::classify("f", json!("   "), None).is_err());
        assert!(Filter::classify("f", json!([]), None).is_err());
        assert!(Filter::classify("f", json!({}), None).is_err());
    }

    #[test]
    fn zero_and_false_are_never_blank() {
        assert!(!is_blank_value(&json!(0)));
        assert!(!is_blank_value(&json!(false)));
        assert!(Filter::classify("f", json!(0), None).is_ok());
        assert!(Filter::classify("f", json!(false), None).is_ok());
    }
}
