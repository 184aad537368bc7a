pub mod listing;
pub mod request;
pub mod status;
pub mod topic;

pub use listing::{FilterCategory, Lesson, PageResult, Rav};
pub use request::{DownloadRequest, RequestId};
pub use status::DownloadStatus;
pub use topic::{StorageLocation, Topic, TopicCatalog};
