//! Test suites for the Portico daemon.

mod bootstrap_behaviour;
pub(crate) mod support;
