//! Input/output formats used by the command-line front end.

pub mod json;
