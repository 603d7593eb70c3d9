pub mod core;
pub mod grades;
pub mod roster;
pub mod scheme;
pub mod scope;
pub mod stats;
