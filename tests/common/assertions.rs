//! Custom assertion macros and utilities
//!
//! Provides assertion macros for engine state with more descriptive
//! failure messages.

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that a result is an error, optionally of a given variant
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        assert!($result.is_err(), "Expected Err, got Ok");
    };
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {}
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => panic!("Expected different error variant, got: {:?}", e),
        }
    };
}

/// Assert that two engines hold identical data on a surface
#[macro_export]
macro_rules! assert_converged {
    ($left:expr, $right:expr, $surface:expr) => {
        let left = $left.surface($surface).expect("left surface");
        let right = $right.surface($surface).expect("right surface");
        pretty_assertions::assert_eq!(
            left.data,
            right.data,
            "surface '{}' diverged",
            $surface
        );
        assert_eq!(left.checksum, right.checksum);
    };
}

/// Assert that a surface document has the expected text
#[macro_export]
macro_rules! assert_document {
    ($engine:expr, $surface:expr, $expected:expr) => {
        let surface = $engine.surface($surface).expect("surface");
        assert_eq!(
            surface.document($crate::common::DOC).unwrap_or_default(),
            $expected,
            "document on '{}'",
            $surface
        );
    };
}
