pub mod scanner;

pub use scanner::{Report, Scanner};
