pub mod filters;
pub mod pivot;
