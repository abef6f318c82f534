pub mod classify;
pub mod labels;
