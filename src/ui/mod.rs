pub mod confirm;
pub mod style;

pub use confirm::{Confirm, PromptConfirm};
