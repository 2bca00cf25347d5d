pub mod membership;
pub mod permission;
pub mod project;
pub mod user;
