//! Compile result assertions.

use helios_search_compiler::{CompiledQuery, ErrorKind, QueryErrors};

/// Asserts that compilation succeeded and returns the query.
pub fn assert_compiles(result: Result<CompiledQuery, QueryErrors>) -> CompiledQuery {
    match result {
        Ok(query) => query,
        Err(errors) => panic!("Expected query to compile, got: {}", errors),
    }
}

/// Asserts that compilation failed with exactly one error of `kind`.
pub fn assert_rejected(result: Result<CompiledQuery, QueryErrors>, kind: ErrorKind) -> QueryErrors {
    match result {
        Ok(query) => panic!("Expected {:?}, got query {:?}", kind, query.to_query_pairs()),
        Err(errors) => {
            assert_eq!(
                errors.errors().len(),
                1,
                "Expected a single error, got: {}",
                errors
            );
            assert_eq!(errors.errors()[0].kind(), kind, "Unexpected error: {}", errors);
            errors
        }
    }
}

/// Asserts the diagnostic of the first error.
pub fn assert_diagnostic(errors: &QueryErrors, expected: &str) {
    let first = errors.first().expect("at least one error");
    assert_eq!(first.to_string(), expected);
}
