//! Host-facing adapters: cart CSV input and the console status view.

pub mod console;
pub mod csv;
