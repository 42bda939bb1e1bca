use mivaapi_core::{ApiError, ApiResult, NonEmptyString};
use serde_json::{Map, Value};

use crate::function::FunctionCall;

/// One manifest entry: a function name and how many calls it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    name: NonEmptyString,
    call_count: usize,
}

impl ManifestEntry {
    /// Creates a validated manifest entry. `call_count` must be at least 1.
    pub fn new(name: impl Into<String>, call_count: usize) -> ApiResult<Self> {
        if call_count == 0 {
            return Err(ApiError::InvalidValue(
                "manifest call count must be at least 1".to_owned(),
            ));
        }

        Ok(Self {
            name: NonEmptyString::new(name)?,
            call_count,
        })
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the number of calls sent for this function.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count
    }
}

/// The ordered record of which functions and call counts a request carried.
///
/// Derived once when a request is finalized and required again, unmodified,
/// to decode the matching response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionManifest(Vec<ManifestEntry>);

impl FunctionManifest {
    /// Creates a manifest from entries. The manifest must not be empty.
    pub fn new(entries: Vec<ManifestEntry>) -> ApiResult<Self> {
        if entries.is_empty() {
            return Err(ApiError::InvalidValue(
                "function manifest must not be empty".to_owned(),
            ));
        }

        Ok(Self(entries))
    }

    /// Returns the entries in the order they were emitted on the wire.
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.0
    }

    /// Returns the number of distinct functions in the request.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A manifest is never empty; provided for completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The wire shape selected for a finalized request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// Exactly one function with one call: call fields at the top level.
    Single,
    /// One function with several calls: an `Iterations` list.
    Iterations,
    /// Multiple distinct functions: an `Operations` list.
    Operations,
}

/// An immutable, finalized request ready for signing and dispatch.
#[derive(Debug, Clone)]
pub struct RequestDocument {
    shape: RequestShape,
    body: Map<String, Value>,
    manifest: FunctionManifest,
}

impl RequestDocument {
    /// Returns the selected wire shape.
    #[must_use]
    pub fn shape(&self) -> RequestShape {
        self.shape
    }

    /// Returns the manifest needed to decode the matching response.
    #[must_use]
    pub fn manifest(&self) -> &FunctionManifest {
        &self.manifest
    }

    /// Returns the document as a JSON object.
    #[must_use]
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Returns the document as a generic JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }

    /// Serializes the document to the exact bytes that get signed and sent.
    pub fn to_bytes(&self) -> ApiResult<Vec<u8>> {
        serde_json::to_vec(&self.body)
            .map_err(|error| ApiError::MalformedPayload(error.to_string()))
    }
}

/// Aggregates function calls and selects the request wire shape.
///
/// Calls group by function name in first-seen order; within a function,
/// call order is preserved. The encoder is mutable builder state scoped to
/// one request; [`RequestEncoder::finalize`] snapshots it into an immutable
/// [`RequestDocument`].
#[derive(Debug, Default)]
pub struct RequestEncoder {
    groups: Vec<(String, Vec<FunctionCall>)>,
}

impl RequestEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a call, grouping it under its function name.
    pub fn add(&mut self, call: FunctionCall) {
        match self
            .groups
            .iter_mut()
            .find(|(name, _)| name.as_str() == call.name())
        {
            Some((_, calls)) => calls.push(call),
            None => self.groups.push((call.name().to_owned(), vec![call])),
        }
    }

    /// Returns true when no calls have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the distinct function names in first-seen order.
    #[must_use]
    pub fn function_names(&self) -> Vec<&str> {
        self.groups.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Produces the final request document for the accumulated calls.
    ///
    /// Shape selection is purely a function of the call set: one function
    /// with one call yields `Single`, one function with several calls
    /// yields `Iterations`, several functions yield `Operations`. When
    /// `include_timestamp` is set, `Miva_Request_Timestamp` carries the
    /// wall-clock epoch seconds at finalize time; each call produces a
    /// fresh value.
    pub fn finalize(
        &self,
        store_code: &str,
        include_timestamp: bool,
    ) -> ApiResult<RequestDocument> {
        if store_code.trim().is_empty() {
            return Err(ApiError::MissingRequiredValue(
                "store code must not be blank".to_owned(),
            ));
        }

        if self.groups.is_empty() {
            return Err(ApiError::MissingRequiredValue(
                "at least one function call is required".to_owned(),
            ));
        }

        let mut body = Map::new();
        body.insert(
            "Store_Code".to_owned(),
            Value::String(store_code.to_owned()),
        );

        if include_timestamp {
            body.insert(
                "Miva_Request_Timestamp".to_owned(),
                Value::from(chrono::Utc::now().timestamp()),
            );
        }

        let shape = match (self.groups.len(), self.groups[0].1.len()) {
            (1, 1) => {
                body.append(&mut self.groups[0].1[0].to_document(true));
                RequestShape::Single
            }
            (1, _) => {
                body.insert(
                    "Function".to_owned(),
                    Value::String(self.groups[0].0.clone()),
                );
                body.insert(
                    "Iterations".to_owned(),
                    Value::Array(
                        self.groups[0]
                            .1
                            .iter()
                            .map(|call| Value::Object(call.to_document(false)))
                            .collect(),
                    ),
                );
                RequestShape::Iterations
            }
            _ => {
                let operations = self
                    .groups
                    .iter()
                    .map(|(name, calls)| {
                        if calls.len() == 1 {
                            Value::Object(calls[0].to_document(true))
                        } else {
                            let mut operation = Map::new();
                            operation
                                .insert("Function".to_owned(), Value::String(name.clone()));
                            operation.insert(
                                "Iterations".to_owned(),
                                Value::Array(
                                    calls
                                        .iter()
                                        .map(|call| Value::Object(call.to_document(false)))
                                        .collect(),
                                ),
                            );
                            Value::Object(operation)
                        }
                    })
                    .collect();

                body.insert("Operations".to_owned(), Value::Array(operations));
                RequestShape::Operations
            }
        };

        let manifest = FunctionManifest::new(
            self.groups
                .iter()
                .map(|(name, calls)| ManifestEntry::new(name.clone(), calls.len()))
                .collect::<ApiResult<Vec<_>>>()?,
        )?;

        Ok(RequestDocument {
            shape,
            body,
            manifest,
        })
    }

    /// Discards all accumulated calls, readying the encoder for the next
    /// logical request.
    pub fn reset(&mut self) {
        self.groups.clear();
    }
}
