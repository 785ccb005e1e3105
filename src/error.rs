pub type ReadreelResult<T> = Result<T, ReadreelError>;

#[derive(thiserror::Error, Debug)]
pub enum ReadreelError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encoder init error: {0}")]
    EncoderInit(String),

    #[error("encode frame error: {0}")]
    EncodeFrame(String),

    #[error("fallback error: {0}")]
    Fallback(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReadreelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encoder_init(msg: impl Into<String>) -> Self {
        Self::EncoderInit(msg.into())
    }

    pub fn encode_frame(msg: impl Into<String>) -> Self {
        Self::EncodeFrame(msg.into())
    }

    pub fn fallback(msg: impl Into<String>) -> Self {
        Self::Fallback(msg.into())
    }
}
