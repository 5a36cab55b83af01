pub mod health;
pub mod receiving;
