pub mod models;
pub mod offsets;
pub mod order_repo;
pub mod subscriber;
