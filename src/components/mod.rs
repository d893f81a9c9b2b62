pub mod colors;
pub mod prompt;
pub mod tools;
