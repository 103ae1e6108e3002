pub mod query;
pub mod term_parser;
pub mod terms;
pub mod triple;
