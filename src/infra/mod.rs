// Adapters behind the application ports

pub mod elasticsearch;
pub mod in_memory_store;
