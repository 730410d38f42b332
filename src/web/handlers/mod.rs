//! Route handler modules for the daybook REST API.

pub mod auth;
pub mod blocks;
pub mod friends;
pub mod health;
pub mod images;
pub mod notes;
pub mod profiles;
pub mod shares;
