pub mod action;
pub mod chat;
