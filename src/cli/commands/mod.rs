pub mod auth;
pub mod data;
pub mod lead;
pub mod nav;
