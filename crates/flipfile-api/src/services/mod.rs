pub mod orchestrator;

pub use orchestrator::{ConversionReceipt, ConversionService, UploadedFile};
