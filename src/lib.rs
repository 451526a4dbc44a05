pub mod cascade;
pub mod config;
pub mod database;
pub mod entities;
pub mod filter;
