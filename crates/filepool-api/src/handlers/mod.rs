pub mod health;
pub mod status;
pub mod upload;

pub use health::health_check;
pub use status::pool_status;
pub use upload::upload_file;
