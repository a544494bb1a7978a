pub mod backend;
pub mod calendar;
pub mod context_builder;
pub mod decoder;
pub mod notifier;
pub mod prompt;
pub mod selector;
