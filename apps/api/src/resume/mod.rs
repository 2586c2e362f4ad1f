// Resume CRUD: typed request contracts in handlers, store orchestration in service.

pub mod handlers;
pub mod service;
