pub mod command;
pub mod configuration;
pub mod head;
pub mod system;
