#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Input file must have a .pdf extension: {0}")]
    NotPdf(String),

    #[error("Cannot read outline file {path}: {reason}")]
    OutlineFile { path: String, reason: String },
}
