// each integration test crate uses a different subset of these helpers.
#![allow(dead_code)]

pub mod logging;
pub mod temp_store;
