pub mod attachment;
pub mod gateway;
pub mod ids;
pub mod message;
