pub mod agent;
pub mod alerts;
pub mod bot;
pub mod config;
pub mod extract;
pub mod feed;
pub mod monitoring;
pub mod rules;
pub mod source;
