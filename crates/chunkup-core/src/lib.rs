pub mod config;
pub mod logging;

pub mod assembler;
pub mod checksum;
pub mod chunk_store;
pub mod error;
pub mod hash;
pub mod hash_index;
pub mod layout;
pub mod session;
pub mod storage;
pub mod verify;

pub use error::{UploadError, UploadResult};
pub use session::{ServiceSettings, UploadService};
