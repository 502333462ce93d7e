pub mod diff;

pub use diff::*;
