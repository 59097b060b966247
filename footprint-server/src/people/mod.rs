pub mod people_handlers;
pub mod person_store;
