pub mod lookup;

pub use lookup::lookup_handler;
