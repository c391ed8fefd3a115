pub mod http_client;
pub mod storage;
pub mod validation;
