pub mod identity;
pub mod resume;
