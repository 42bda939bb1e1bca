use mivaapi_core::{ApiResult, NonEmptyString};
use serde_json::{Map, Value};

use crate::filter::Filter;

/// One named remote function invocation with its parameters and filters.
///
/// Built fluently and owned by the caller until handed to the request
/// encoder; serialization snapshots it into the per-call JSON fragment.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    name: NonEmptyString,
    count: Option<u64>,
    offset: Option<u64>,
    sort: Option<String>,
    params: Vec<(String, Value)>,
    filters: Vec<Filter>,
}

impl FunctionCall {
    /// Creates a call for the named API function.
    pub fn new(name: impl Into<String>) -> ApiResult<Self> {
        Ok(Self {
            name: NonEmptyString::new(name)?,
            count: None,
            offset: None,
            sort: None,
            params: Vec::new(),
            filters: Vec::new(),
        })
    }

    /// Sets the record count. Zero is a valid count.
    #[must_use]
    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Sets the record offset.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the sort expression, e.g. `code` or `-code`.
    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Adds an arbitrary named parameter, preserving insertion order.
    ///
    /// Setting a name twice replaces the earlier value in place.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();

        if let Some(existing) = self.params.iter_mut().find(|(key, _)| *key == name) {
            existing.1 = value;
        } else {
            self.params.push((name, value));
        }

        self
    }

    /// Adds a sequence of named parameters in order.
    #[must_use]
    pub fn params<I, K>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (name, value) in parameters {
            self = self.param(name, value);
        }

        self
    }

    /// Sets the `Passphrase` parameter used by encrypted payment functions.
    #[must_use]
    pub fn passphrase(self, passphrase: impl Into<String>) -> Self {
        self.param("Passphrase", Value::String(passphrase.into()))
    }

    /// Adds a filter, classifying the value by filter name.
    ///
    /// The call's own function name is the owner for `show` filters.
    pub fn filter(mut self, name: &str, value: Value) -> ApiResult<Self> {
        let filter = Filter::classify(name, value, Some(self.name.as_str()))?;
        self.filters.push(filter);

        Ok(self)
    }

    /// Adds a sequence of filters in order.
    pub fn filters<'a, I>(mut self, filters: I) -> ApiResult<Self>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        for (name, value) in filters {
            self = self.filter(name, value)?;
        }

        Ok(self)
    }

    /// Adds an `ondemandcolumns` filter from a list of column names.
    pub fn on_demand_columns<I, C>(self, columns: I) -> ApiResult<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let columns: Vec<Value> = columns
            .into_iter()
            .map(|column| Value::String(column.into()))
            .collect();

        self.filter("ondemandcolumns", Value::Array(columns))
    }

    /// Shorthand for [`FunctionCall::on_demand_columns`].
    pub fn odc<I, C>(self, columns: I) -> ApiResult<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.on_demand_columns(columns)
    }

    /// Returns the API function name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the filters added so far, in insertion order.
    #[must_use]
    pub fn filter_list(&self) -> &[Filter] {
        &self.filters
    }

    /// Serializes the call into its per-call JSON fragment.
    ///
    /// `include_function` is false for records nested in an `Iterations`
    /// list, where the function name lives on the enclosing object. Fields
    /// never set are omitted entirely.
    #[must_use]
    pub fn to_document(&self, include_function: bool) -> Map<String, Value> {
        let mut document = Map::new();

        if include_function {
            document.insert(
                "Function".to_owned(),
                Value::String(self.name.as_str().to_owned()),
            );
        }

        if let Some(count) = self.count {
            document.insert("Count".to_owned(), Value::from(count));
        }

        if let Some(offset) = self.offset {
            document.insert("Offset".to_owned(), Value::from(offset));
        }

        if let Some(sort) = &self.sort {
            document.insert("Sort".to_owned(), Value::String(sort.clone()));
        }

        if !self.filters.is_empty() {
            document.insert(
                "Filter".to_owned(),
                Value::Array(self.filters.iter().map(Filter::to_value).collect()),
            );
        }

        for (name, value) in &self.params {
            document.insert(name.clone(), value.clone());
        }

        document
    }
}
