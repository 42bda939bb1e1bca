//! Protocol data model and encode/decode logic for the Miva JSON API.

#![forbid(unsafe_code)]

mod error_bag;
mod filter;
mod function;
mod request;
mod response;

pub use error_bag::{ErrorBag, FieldError, ResponseError};
pub use filter::{Filter, FilterKind, SearchClause, is_blank_value, show_filter_name};
pub use function::FunctionCall;
pub use request::{
    FunctionManifest, ManifestEntry, RequestDocument, RequestEncoder, RequestShape,
};
pub use response::{ContentRange, DecodedResponse};

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::{Filter, FunctionCall, RequestEncoder, RequestShape, is_blank_value};

    proptest! {
        #[test]
        fn numbers_and_booleans_are_never_blank(number in any::<i64>(), flag in any::<bool>()) {
            prop_assert!(!is_blank_value(&serde_json::json!(number)));
            prop_assert!(!is_blank_value(&serde_json::json!(flag)));
            prop_assert!(Filter::classify("f", serde_json::json!(number), None).is_ok());
            prop_assert!(Filter::classify("f", serde_json::json!(flag), None).is_ok());
        }

        #[test]
        fn whitespace_only_values_are_always_blank(text in "[ \t\r\n]{0,12}") {
            prop_assert!(is_blank_value(&serde_json::json!(text)));
        }

        #[test]
        fn shape_follows_the_call_set(call_count in 1_usize..6, extra_function in any::<bool>()) {
            let mut encoder = RequestEncoder::new();

            for _ in 0..call_count {
                encoder.add(
                    FunctionCall::new("ProductList_Load_Query")
                        .unwrap_or_else(|_| unreachable!()),
                );
            }

            if extra_function {
                encoder.add(FunctionCall::new("Product_Insert").unwrap_or_else(|_| unreachable!()));
            }

            let document = encoder
                .finalize("PS", false)
                .unwrap_or_else(|_| unreachable!());

            let expected = match (extra_function, call_count) {
                (true, _) => RequestShape::Operations,
                (false, 1) => RequestShape::Single,
                (false, _) => RequestShape::Iterations,
            };

            prop_assert_eq!(document.shape(), expected);

            let total: usize = document
                .manifest()
                .entries()
                .iter()
                .map(|entry| entry.call_count())
                .sum();

            prop_assert_eq!(total, call_count + usize::from(extra_function));
        }
    }
}
