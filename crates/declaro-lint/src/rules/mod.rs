//! Built-in lint rules.

mod column;
mod index;
mod object;
mod table;

pub use column::{DisplayWidth, HasEnum, HasFloat};
pub use index::DupeIndex;
pub use object::{HasForeignKey, HasRoutine};
pub use table::{AutoInc, Charset, Engine, HasPrimaryKey};

use crate::checker::Checker;

/// Every built-in rule, in reporting order.
pub fn standard() -> Vec<Box<dyn Checker>> {
    vec![
        Box::new(HasPrimaryKey),
        Box::new(DisplayWidth),
        Box::new(Charset),
        Box::new(Engine),
        Box::new(HasFloat),
        Box::new(HasEnum),
        Box::new(DupeIndex),
        Box::new(HasForeignKey),
        Box::new(HasRoutine),
        Box::new(AutoInc),
    ]
}
