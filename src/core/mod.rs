pub mod batch;
pub mod config;
pub mod document;
pub mod error;
pub(crate) mod font;
pub mod images;
pub mod model;
pub mod ocr;
pub mod text;
