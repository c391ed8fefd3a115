// Shared library untuk semua crate Obrolan
pub mod models;
pub mod utils;
