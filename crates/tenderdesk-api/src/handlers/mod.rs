pub mod batch;
pub mod documents;
pub mod extraction;
pub mod health;
pub mod providers;
