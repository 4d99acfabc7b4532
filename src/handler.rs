pub mod auth;
pub mod content;
pub mod course;
pub mod enrollment;
pub mod payment;
pub mod review;
pub mod users;
