pub mod event;
pub mod integration;
pub mod message;
pub mod room;
pub mod state;
pub mod user;
