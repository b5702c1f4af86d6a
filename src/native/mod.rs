pub mod body_parser;

pub use body_parser::ContentBodyParser;
