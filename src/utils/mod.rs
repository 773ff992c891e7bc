pub mod latch;
pub mod validation;
