mod parser;
pub use parser::*;

mod input;
pub use input::*;
