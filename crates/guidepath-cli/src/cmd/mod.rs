pub mod catalog;
pub mod config;
pub mod gate;
pub mod init;
pub mod mentor;
pub mod module;
pub mod quiz;
pub mod sim;
pub mod status;
pub mod step;
