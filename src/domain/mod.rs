// Domain module: problem data, the abstract model and the solver contract

pub mod errors;
pub mod models;
pub mod problem;
pub mod solver_service;
pub mod value_objects;

pub use errors::*;
pub use models::*;
pub use problem::*;
pub use solver_service::*;
pub use value_objects::*;
