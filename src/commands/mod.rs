//! Command registry relationships used for permission scoping and alias
//! resolution.

mod tree;
#[cfg(test)]
mod tests;

pub use tree::*;
