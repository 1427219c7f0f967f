pub mod download;
pub mod files;
pub mod history;
pub mod status;
pub mod upload;
