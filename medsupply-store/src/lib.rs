pub mod app_config;
pub mod fixtures;
pub mod session;

pub use app_config::Config;
pub use fixtures::{FixtureError, Fixtures};
pub use session::{
    Attachment, AttachmentError, AttachmentReport, AttachmentUpload, MemorySessionBackend, SessionBackend,
    SessionError, SessionStore,
};
