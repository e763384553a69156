use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailbotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown mailbox: {0}")]
    UnknownMailbox(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid search results: {0}")]
    SearchListing(String),

    #[error("Invalid index file {file}:{line}: {content}")]
    IndexLine {
        file: String,
        line: usize,
        content: String,
    },

    #[error("Invalid transaction line {line}: {reason}")]
    TransactionLine { line: usize, reason: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Editor failed: {0}")]
    Editor(String),
}

pub type Result<T> = std::result::Result<T, MailbotError>;
