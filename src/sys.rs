pub mod executor;
pub mod lid;
pub mod process;
pub mod wayland;
