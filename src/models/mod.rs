pub mod decision;
pub mod event;
