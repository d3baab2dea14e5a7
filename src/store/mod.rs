pub mod atomic;
pub mod files;
pub mod index;
pub mod lock;
pub mod repo;
pub mod today;
