//! Utilities shared by the Haiso server and client.

pub mod logger;
pub mod time;
