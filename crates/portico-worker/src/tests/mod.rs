//! Behavioural tests for the worker message bridge.
