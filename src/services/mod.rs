pub mod key_builder;
#[cfg(test)]
pub mod memory_store;
pub mod object_store;
pub mod s3_client;
pub mod storage_service;
