//! Serde model of the Bodymovin / Lottie JSON document.
//!
//! These types mirror the wire format one to one. They are decoded piecewise by
//! the streaming parser in `lottie-core` and converted into the evaluated model.

pub mod model;
