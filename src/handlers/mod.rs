pub mod directory_index;
pub mod health_handlers;
pub mod object_handlers;
