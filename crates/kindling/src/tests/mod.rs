//! Test suites for the Kindling bootstrap.

mod support;
