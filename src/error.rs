use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid cadastral block '{0}', expected three colon separated numeric groups (XX:XX:XXXXXXX)")]
    InvalidBlockId(String),
    #[error("'{value}' is not a number in {min}..={max}")]
    InvalidNumber { value: String, min: u32, max: u32 },
    #[error("Invalid range {start}..={end}")]
    InvalidRange { start: u32, end: u32 },
    #[error("Input closed before a valid answer was given.")]
    InputClosed,

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Unexpected status {status} for {cad_num}")]
    UnexpectedStatus { status: u16, cad_num: String },

    #[error("Malformed payload for {cad_num}: {source}")]
    Payload {
        cad_num: String,
        source: serde_json::Error,
    },

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Logger Error: {0}")]
    Logger(#[from] flexi_logger::FlexiLoggerError),
    #[error("Config Error: {0}")]
    Config(String),

    #[error("Scan aborted: {0}")]
    Fatal(String),
}
