pub mod feed;
pub mod health;
