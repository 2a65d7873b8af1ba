//! End-to-end tests that drive the HTTP router against the fake engine

mod e2e;
