pub mod binding;
pub mod clock;
pub mod context;
pub mod mix_bus;
pub mod monitor;
pub mod registry;
pub mod stream;
