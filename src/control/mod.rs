pub mod climate;
pub mod relay;
