pub mod auth;
pub mod forms;
pub mod submissions;
pub mod submit;
