use std::collections::{BTreeMap, HashMap};

use http::{HeaderMap, StatusCode};
use mivaapi_core::{ApiError, ApiResult};
use serde_json::{Map, Value};

use crate::error_bag::{ErrorBag, ResponseError};
use crate::request::FunctionManifest;

/// The completed/total operation counts from a partial response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    completed: u64,
    total: u64,
}

impl ContentRange {
    /// Returns how many operations the server completed.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Returns how many operations the request carried in total.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// A decoded API response: per-function, per-index results plus the
/// aggregated error collection.
///
/// Built once per response by [`DecodedResponse::decode`] and immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct DecodedResponse {
    body: String,
    functions: Vec<String>,
    results: HashMap<String, BTreeMap<usize, Value>>,
    errors: ErrorBag,
    has_failure: bool,
    success: bool,
    status_code: StatusCode,
    content_range: Option<ContentRange>,
}

impl DecodedResponse {
    /// Decodes a raw response body against the manifest of the request
    /// that produced it.
    ///
    /// The body's wire shape varies with the request shape: a single
    /// object is the sole result of the first manifest entry; a list maps
    /// positionally onto iterations (single-function manifest) or onto
    /// operations (multi-function manifest), where each operation element
    /// may itself be a list of iteration results. List elements beyond the
    /// manifest length are ignored, as are non-object results.
    ///
    /// Fails with `MalformedPayload` when the body is not valid JSON.
    pub fn decode(
        manifest: &FunctionManifest,
        body: &str,
        status_code: StatusCode,
        headers: &HeaderMap,
    ) -> ApiResult<Self> {
        let parsed: Value = serde_json::from_str(body)
            .map_err(|error| ApiError::MalformedPayload(error.to_string()))?;

        let mut functions: Vec<String> = Vec::new();
        for entry in manifest.entries() {
            if !functions.iter().any(|name| name.as_str() == entry.name()) {
                functions.push(entry.name().to_owned());
            }
        }

        let mut response = Self {
            body: body.to_owned(),
            functions,
            results: HashMap::new(),
            errors: ErrorBag::new(),
            has_failure: false,
            success: false,
            status_code,
            content_range: parse_content_range(headers),
        };

        let entries = manifest.entries();

        match parsed {
            Value::Object(result) => {
                response.add_result(entries[0].name(), 0, result);
            }
            Value::Array(results) if entries.len() == 1 => {
                let name = entries[0].name();

                for (index, result) in results.into_iter().enumerate() {
                    if let Value::Object(result) = result {
                        response.add_result(name, index, result);
                    }
                }
            }
            Value::Array(results) => {
                for (operation_index, result) in results.into_iter().enumerate() {
                    let Some(entry) = entries.get(operation_index) else {
                        break;
                    };

                    match result {
                        Value::Array(iterations) => {
                            for (index, iteration) in iterations.into_iter().enumerate() {
                                if let Value::Object(iteration) = iteration {
                                    response.add_result(entry.name(), index, iteration);
                                }
                            }
                        }
                        Value::Object(result) => {
                            response.add_result(entry.name(), 0, result);
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }

        response.success = !response.has_failure && !response.errors.has();

        Ok(response)
    }

    fn add_result(&mut self, function_name: &str, index: usize, result: Map<String, Value>) {
        let success = result.get("success").is_some_and(truthy);

        // Error fields take precedence: a result can carry an error even
        // when its success flag is truthy.
        match ResponseError::from_result(function_name, index, &result) {
            Some(error) => {
                self.errors.push(error);
                self.has_failure = true;
            }
            None if !success => {
                self.has_failure = true;
            }
            None => {}
        }

        self.results
            .entry(function_name.to_owned())
            .or_default()
            .insert(index, Value::Object(result));
    }

    /// Returns true when every result succeeded and no errors were
    /// collected.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Returns true when any result reported failure.
    #[must_use]
    pub fn failed(&self) -> bool {
        !self.success
    }

    /// Returns true when any individual result failed or carried an error.
    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.has_failure
    }

    /// Returns true when the error collection is non-empty.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors.has()
    }

    /// Returns the aggregated error collection.
    #[must_use]
    pub fn errors(&self) -> &ErrorBag {
        &self.errors
    }

    /// Returns the raw response body.
    #[must_use]
    pub fn body(&self) -> &str {
        self.body.as_str()
    }

    /// Returns the unique function names from the request manifest.
    #[must_use]
    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    /// Returns the HTTP status code of the response.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Returns true when the server completed only part of the batch.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.content_range.is_some()
    }

    /// Returns the completed/total counts from a partial response.
    #[must_use]
    pub fn content_range(&self) -> Option<ContentRange> {
        self.content_range
    }

    /// Returns every stored result, keyed by function name and call index.
    #[must_use]
    pub fn results(&self) -> &HashMap<String, BTreeMap<usize, Value>> {
        &self.results
    }

    /// Returns the result payload for a function at a call index.
    ///
    /// When the result object carries a nested `data` value, that payload
    /// is returned; otherwise the whole result object is. Fails with
    /// `InvalidValue` for a function the request never sent or an index
    /// that has no result.
    pub fn data(&self, function_name: &str, index: usize) -> ApiResult<&Value> {
        let results = self.function_results(function_name)?;

        let result = results.get(&index).ok_or_else(|| {
            ApiError::InvalidValue(format!(
                "index \"{index}\" does not exist for function \"{function_name}\""
            ))
        })?;

        Ok(result
            .get("data")
            .filter(|payload| !payload.is_null())
            .unwrap_or(result))
    }

    /// Returns every result for a function in call-index order.
    ///
    /// Fails with `InvalidValue` for a function the request never sent.
    pub fn function(&self, function_name: &str) -> ApiResult<Vec<&Value>> {
        Ok(self
            .function_results(function_name)?
            .values()
            .collect())
    }

    fn function_results(&self, function_name: &str) -> ApiResult<&BTreeMap<usize, Value>> {
        static EMPTY: BTreeMap<usize, Value> = BTreeMap::new();

        if !self.functions.iter().any(|name| name.as_str() == function_name) {
            return Err(ApiError::InvalidValue(format!(
                "function name \"{function_name}\" invalid or missing from results list"
            )));
        }

        Ok(self.results.get(function_name).unwrap_or(&EMPTY))
    }
}

/// PHP-style truthiness used for the per-result `success` flag.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64() != Some(0.0),
        Value::String(text) => !text.is_empty() && text != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

fn parse_content_range(headers: &HeaderMap) -> Option<ContentRange> {
    let header = headers.get(http::header::CONTENT_RANGE)?.to_str().ok()?;
    let (completed, total) = header.trim().split_once('/')?;

    Some(ContentRange {
        completed: completed.trim().parse().ok()?,
        total: total.trim().parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, HeaderValue, StatusCode};
    use serde_json::json;

    use super::DecodedResponse;
    use crate::request::{FunctionManifest, ManifestEntry};

    fn manifest(entries: &[(&str, usize)]) -> FunctionManifest {
        FunctionManifest::new(
            entries
                .iter()
                .map(|(name, count)| {
                    ManifestEntry::new(*name, *count).unwrap_or_else(|_| unreachable!())
                })
                .collect(),
        )
        .unwrap_or_else(|_| unreachable!())
    }

    fn decode(manifest: &FunctionManifest, body: &str) -> DecodedResponse {
        DecodedResponse::decode(manifest, body, StatusCode::OK, &HeaderMap::new())
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn single_object_body_is_the_first_functions_result() {
        let manifest = manifest(&[("ProductList_Load_Query", 1)]);
        let response = decode(
            &manifest,
            r#"{"success": 1, "data": {"total_count": 117, "data": [{"code": "prod1"}]}}"#,
        );

        assert!(response.is_success());
        assert!(!response.has_errors());

        let data = response
            .data("ProductList_Load_Query", 0)
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(data.get("total_count"), Some(&json!(117)));
    }

    #[test]
    fn list_body_with_single_function_maps_iterations_by_position() {
        let manifest = manifest(&[("Product_Insert", 2)]);
        let response = decode(
            &manifest,
            r#"[{"success": 1, "data": {"code": "a"}}, {"success": 1, "data": {"code": "b"}}]"#,
        );

        assert!(response.is_success());
        assert_eq!(
            response
                .function("Product_Insert")
                .unwrap_or_else(|_| unreachable!())
                .len(),
            2
        );

        let second = response
            .data("Product_Insert", 1)
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(second.get("code"), Some(&json!("b")));
    }

    #[test]
    fn list_body_with_multiple_functions_maps_operations_by_position() {
        let manifest = manifest(&[
            ("CategoryList_Load_Query", 1),
            ("Product_Update", 2),
        ]);
        let response = decode(
            &manifest,
            r#"[
                {"success": 1, "data": {"total_count": 3}},
                [{"success": 1}, {"success": 1}]
            ]"#,
        );

        assert!(response.is_success());

        let updates = response
            .function("Product_Update")
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(updates.len(), 2);

        let load = response
            .data("CategoryList_Load_Query", 0)
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(load.get("total_count"), Some(&json!(3)));
    }

    #[test]
    fn list_elements_beyond_the_manifest_are_ignored() {
        let manifest = manifest(&[("Product_Insert", 1)]);
        let response = decode(
            &manifest,
            r#"[{"success": 1}, {"success": 0, "error_code": "x", "error_message": "y"}]"#,
        );

        // Single-entry manifest: the extra element is a second iteration.
        assert_eq!(
            response
                .function("Product_Insert")
                .unwrap_or_else(|_| unreachable!())
                .len(),
            2
        );

        let manifest = manifest_pair();
        let response = decode(
            &manifest,
            r#"[{"success": 1}, {"success": 1}, {"success": 0, "error_code": "x", "error_message": "y"}]"#,
        );

        assert!(response.is_success());
        assert!(response.errors().is_empty());
    }

    fn manifest_pair() -> FunctionManifest {
        manifest(&[("Product_Insert", 1), ("Product_Update", 1)])
    }

    #[test]
    fn failed_results_are_captured_in_the_error_collection() {
        let manifest = manifest(&[("CategoryList_Load_Query", 1)]);
        let response = decode(
            &manifest,
            r#"{"success": 0, "error_code": "FUNC-1", "error_message": "Invalid function"}"#,
        );

        assert!(response.failed());
        assert!(response.has_failure());
        assert_eq!(response.errors().len(), 1);
        assert_eq!(response.errors().messages(), vec!["Invalid function"]);
    }

    #[test]
    fn error_fields_take_precedence_over_a_truthy_success_flag() {
        let manifest = manifest(&[("Product_Insert", 1)]);
        let response = decode(
            &manifest,
            r#"{"success": 1, "error_code": "DUP", "error_message": "Duplicate code"}"#,
        );

        assert!(response.has_failure());
        assert!(response.failed());
        assert_eq!(response.errors().len(), 1);
    }

    #[test]
    fn a_falsy_success_without_error_fields_still_fails_the_batch() {
        let manifest = manifest(&[("Product_Insert", 1)]);
        let response = decode(&manifest, r#"{"success": 0}"#);

        assert!(response.has_failure());
        assert!(response.failed());
        assert!(response.errors().is_empty());
    }

    #[test]
    fn a_missing_success_flag_counts_as_failure() {
        let manifest = manifest(&[("Product_Insert", 1)]);
        let response = decode(&manifest, r#"{"processed": true}"#);

        assert!(response.has_failure());
    }

    #[test]
    fn validation_errors_are_searchable_by_field() {
        let manifest = manifest(&[("Product_Update", 2)]);
        let response = decode(
            &manifest,
            r#"[
                {"success": 1},
                {
                    "success": 0,
                    "error_code": "Product_Update-2",
                    "error_message": "One or more parameters are invalid",
                    "validation_error": 1,
                    "error_fields": [
                        {"error_field": "Product_Price", "error_message": "Invalid"}
                    ]
                }
            ]"#,
        );

        assert!(response.has_errors());
        assert_eq!(response.errors().for_field("Product_Price").len(), 1);
        assert_eq!(
            response.errors().all()[0].index(),
            Some(1)
        );
    }

    #[test]
    fn content_range_marks_the_response_partial() {
        let manifest = manifest(&[("ProductList_Load_Query", 1)]);
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_RANGE,
            HeaderValue::from_static("3/5"),
        );

        let response = DecodedResponse::decode(
            &manifest,
            r#"{"success": 1}"#,
            StatusCode::PARTIAL_CONTENT,
            &headers,
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(response.is_partial());
        assert_eq!(response.status_code(), StatusCode::PARTIAL_CONTENT);

        let range = response.content_range().unwrap_or_else(|| unreachable!());
        assert_eq!(range.completed(), 3);
        assert_eq!(range.total(), 5);
    }

    #[test]
    fn a_malformed_content_range_is_treated_as_absent() {
        let manifest = manifest(&[("ProductList_Load_Query", 1)]);
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_RANGE,
            HeaderValue::from_static("operations"),
        );

        let response = DecodedResponse::decode(
            &manifest,
            r#"{"success": 1}"#,
            StatusCode::OK,
            &headers,
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(!response.is_partial());
    }

    #[test]
    fn data_falls_back_to_the_whole_result_without_a_data_key() {
        let manifest = manifest(&[("Product_Insert", 1)]);
        let response = decode(&manifest, r#"{"success": 1, "code": "new-product"}"#);

        let data = response
            .data("Product_Insert", 0)
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(data.get("code"), Some(&json!("new-product")));
    }

    #[test]
    fn unknown_functions_and_indexes_are_invalid() {
        let manifest = manifest(&[("Product_Insert", 1)]);
        let response = decode(&manifest, r#"{"success": 1}"#);

        assert!(response.data("Product_Delete", 0).is_err());
        assert!(response.function("Product_Delete").is_err());
        assert!(response.data("Product_Insert", 3).is_err());
    }

    #[test]
    fn invalid_json_is_a_malformed_payload() {
        let manifest = manifest(&[("Product_Insert", 1)]);
        let result = DecodedResponse::decode(
            &manifest,
            "<html>gateway timeout</html>",
            StatusCode::OK,
            &HeaderMap::new(),
        );

        assert!(result.is_err());
    }

    #[test]
    fn http_error_statuses_still_decode() {
        let manifest = manifest(&[("Product_Insert", 1)]);
        let response = DecodedResponse::decode(
            &manifest,
            r#"{"success": 0, "error_code": "AUTH", "error_message": "denied"}"#,
            StatusCode::FORBIDDEN,
            &HeaderMap::new(),
        )
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        assert!(response.failed());
    }
}
