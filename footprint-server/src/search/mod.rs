pub mod job_store;
pub mod search_handlers;
