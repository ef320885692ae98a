//! Core engine: the concurrent scan pipeline and the paper portfolio fed by it.

pub mod portfolio;
pub mod scanner;
