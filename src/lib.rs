pub mod analysis;
pub mod annotation;
pub mod bundle;
pub mod config;
pub mod error;
pub mod indicator;
pub mod interaction;
pub mod model;
pub mod render;
pub mod session;
pub mod smoothing;
pub mod snapshot;
pub mod source;
