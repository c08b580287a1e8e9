//! Grammar definitions shared by integration tests and benches.

pub mod grammars;
