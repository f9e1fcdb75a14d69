pub mod accounts;
pub mod admin;
pub mod bookings;
pub mod cart;
pub mod catalog;
pub mod gallery;
pub mod store;
