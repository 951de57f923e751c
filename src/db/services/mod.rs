pub mod sheet_service;
pub mod user_service;
