//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use std::time::Duration;
use vargraph::graph::{Message, Outbound};
use vargraph::Value;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Scalar message for a variable
pub fn scalar(value: impl Into<Value>) -> Message {
    Message::scalar(&value.into())
}

/// Outbound messages emitted by `variable`
pub fn emitted_by<'a>(outbound: &'a [Outbound], variable: &str) -> Vec<&'a Outbound> {
    outbound.iter().filter(|o| o.variable == variable).collect()
}

/// Float payload of an outbound message
pub fn float_payload(outbound: &Outbound) -> f64 {
    outbound
        .message
        .field("float")
        .and_then(|text| text.parse().ok())
        .expect("float payload")
}
