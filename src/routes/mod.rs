pub mod health;
pub mod members;
pub mod permissions;
pub mod projects;
pub mod users;
