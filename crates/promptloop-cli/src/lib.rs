//! promptloop CLI library — command implementations shared by the
//! `promptloop` binary and its integration tests.

pub mod commands;
