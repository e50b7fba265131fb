pub mod result_repository;
pub mod user_repository;
pub mod vote_repository;

pub use result_repository::*;
pub use user_repository::*;
pub use vote_repository::*;
