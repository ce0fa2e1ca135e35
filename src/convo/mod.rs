pub mod adapters;
pub mod canonical;
pub mod config;
pub mod identity;
pub mod import;
pub mod index;
pub mod local_index;
pub mod model;
pub mod noise;
pub mod paths;
pub mod store;
pub mod text;
pub mod timestamp;
pub mod warn;
