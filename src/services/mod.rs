pub mod processor;
pub mod storage;
