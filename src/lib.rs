pub mod commit;
pub mod config;
pub mod decode;
pub mod document;
pub mod docx;
pub mod editor;
pub mod error;
pub mod markup;
pub mod pipeline;
pub mod progress;
pub mod resource;
pub mod sanitize;

pub use error::{DecodeError, ImportError};
