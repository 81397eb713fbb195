pub mod directory;
pub mod local_store;
pub mod memory_store;
pub mod readiness;
pub mod signer;
pub mod storage;
