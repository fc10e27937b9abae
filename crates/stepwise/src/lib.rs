//! Command line front-end for question trees.
//!
//! Trees are read from JSON, pre-seeded with answers from a file and resolved
//! without a terminal: every remaining question is answered from its default.

pub mod cli;
pub mod cmd;
pub mod config;
pub mod logging;
