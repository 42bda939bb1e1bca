use serde_json::{Map, Value};

/// One field-level error nested inside a response error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    field: Option<String>,
    message: Option<String>,
}

impl FieldError {
    /// Returns the field name, if the server supplied one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Returns the field-level message, if the server supplied one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// A structured error captured from one result in an API response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseError {
    code: String,
    message: String,
    field: Option<String>,
    field_message: Option<String>,
    validation_error: bool,
    input_errors: bool,
    field_errors: Vec<FieldError>,
    function_name: Option<String>,
    index: Option<usize>,
}

impl ResponseError {
    /// Extracts a structured error from a raw result object.
    ///
    /// Returns `None` when the object carries neither `error_code` nor
    /// `error_message`; the result may still represent a failure via its
    /// `success` flag, which the decoder tracks separately.
    #[must_use]
    pub fn from_result(
        function_name: &str,
        index: usize,
        result: &Map<String, Value>,
    ) -> Option<Self> {
        let code = result.get("error_code");
        let message = result.get("error_message");

        if code.is_none() && message.is_none() {
            return None;
        }

        let field_errors = result
            .get("error_fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|field| FieldError {
                        field: string_field(field, "error_field"),
                        message: string_field(field, "error_message"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            code: code.map(stringify).unwrap_or_default(),
            message: message.map(stringify).unwrap_or_default(),
            field: string_field(result, "error_field"),
            field_message: string_field(result, "error_field_message"),
            validation_error: flag_field(result, "validation_error"),
            input_errors: flag_field(result, "input_errors"),
            field_errors,
            function_name: Some(function_name.to_owned()),
            index: Some(index),
        })
    }

    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Returns the field associated with the error, if provided.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Returns the field-specific error message, if provided.
    #[must_use]
    pub fn field_message(&self) -> Option<&str> {
        self.field_message.as_deref()
    }

    /// Whether the server flagged this as a validation error.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        self.validation_error
    }

    /// Whether the server flagged input-level errors.
    #[must_use]
    pub fn has_input_errors(&self) -> bool {
        self.input_errors
    }

    /// Returns the nested field-level errors.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Returns the function name that produced the error.
    #[must_use]
    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    /// Returns the iteration or operation index the error belongs to.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    fn matches_field(&self, field: &str) -> bool {
        if self
            .field
            .as_deref()
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(field))
        {
            return true;
        }

        self.field_errors.iter().any(|field_error| {
            field_error
                .field
                .as_deref()
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(field))
        })
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).filter(|v| !v.is_null()).map(stringify)
}

fn flag_field(object: &Map<String, Value>, key: &str) -> bool {
    match object.get(key) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64() != Some(0.0),
        Some(Value::String(text)) => !text.is_empty() && text != "0",
        _ => false,
    }
}

/// An append-only, order-preserving collection of response errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBag {
    errors: Vec<ResponseError>,
}

impl ErrorBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the bag contains any errors.
    #[must_use]
    pub fn has(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the number of collected errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true when the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns all errors in collection order.
    #[must_use]
    pub fn all(&self) -> &[ResponseError] {
        &self.errors
    }

    /// Returns every error message in collection order.
    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(ResponseError::message).collect()
    }

    /// Returns the errors matching a field name, case-insensitively.
    ///
    /// A match is either the error's own field or any of its nested
    /// field-level errors.
    #[must_use]
    pub fn for_field(&self, field: &str) -> Vec<&ResponseError> {
        self.errors
            .iter()
            .filter(|error| error.matches_field(field))
            .collect()
    }

    /// Appends one error.
    pub fn push(&mut self, error: ResponseError) {
        self.errors.push(error);
    }

    /// Appends every error from another bag, preserving order. Duplicates
    /// are kept.
    pub fn merge(&mut self, other: ErrorBag) {
        self.errors.extend(other.errors);
    }
}

impl<'a> IntoIterator for &'a ErrorBag {
    type Item = &'a ResponseError;
    type IntoIter = std::slice::Iter<'a, ResponseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
