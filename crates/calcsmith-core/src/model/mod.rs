//! Calculator definition model

mod calculator;
mod field;
mod formula;

pub use calculator::Calculator;
pub use field::{DataSource, Field, FieldKind};
pub use formula::{DisplayFormat, Formula};
