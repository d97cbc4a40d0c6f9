//! Query expression compiler.
//!
//! A *pattern entity* is an ordinary entity whose populated properties
//! denote filter constraints: numbers, datetimes and strings become
//! range or wildcard terms, booleans and references become equality
//! terms, and a reference to a not-yet-persisted entity recurses into it
//! as a sub-pattern. Three backend dialects are compiled from the same
//! classification rules; they differ only in quoting, identifier
//! mangling and expression combination.
//!
//! The compiler is total: malformed or empty input degrades to an
//! omitted sub-expression (`None`), never an error. Reference cycles in
//! the pattern graph are cut by a visited set.
//!
//! A reserved wildcard property (`*`) acts as an escape hatch: if its
//! first value already reads as a complete filter expression (contains
//! `==` past the first character), dialects that can carry it return it
//! verbatim.

mod filter;
mod flatten;
mod property_table;
mod term;
mod type_table;

pub use filter::filter_query;
pub use property_table::property_table_query;
pub use type_table::type_table_query;
