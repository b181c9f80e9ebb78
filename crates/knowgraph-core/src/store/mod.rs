pub mod activity;
pub mod cancel;
pub mod database;
pub mod history;
pub mod schema;
pub mod traits;

pub use activity::{CoEditCounts, FileEvent};
pub use cancel::CancelToken;
pub use database::Database;
pub use traits::{GraphData, GraphStore};
