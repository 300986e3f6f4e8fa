// Core metadata module - locates and parses the comment block that declares
// a script's identity (`==UserScript==` / `==UserStyle==`).

pub mod metadata_models;
pub mod metadata_parser;

pub use metadata_models::*;
pub use metadata_parser::{extract, strip_metadata};
