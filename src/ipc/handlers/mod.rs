pub mod backup;
pub mod config;
pub mod core;
pub mod courses;
pub mod tabs;
pub mod toggles;
