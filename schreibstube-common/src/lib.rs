pub mod cache;
pub mod clock;
pub mod model;
pub mod pagination;
