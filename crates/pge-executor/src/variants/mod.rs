//! The three executor variants

mod diff_apply;
mod refactor;
mod scaffold;

pub use diff_apply::DiffApplyExecutor;
pub use refactor::RefactorExecutor;
pub use scaffold::{ScaffoldExecutor, SCAFFOLD_MARKER};
