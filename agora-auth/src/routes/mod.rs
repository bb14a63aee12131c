pub mod admin;
pub mod health;
pub mod login;
pub mod logout;
pub mod me;
pub mod oauth;
pub mod register;
