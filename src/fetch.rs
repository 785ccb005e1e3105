use std::path::PathBuf;

use crate::error::{ReadreelError, ReadreelResult};

/// Where the animated background comes from. Exports in the app fetch by
/// URL from the image provider; paths and in-memory bytes cover local use
/// and tests.
#[derive(Clone, Debug)]
pub enum GifSource {
    Url(String),
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl GifSource {
    /// Treats `http(s)://...` as a URL, anything else as a local path.
    pub fn from_arg(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            Self::Url(arg.to_string())
        } else {
            Self::Path(PathBuf::from(arg))
        }
    }
}

pub fn fetch_gif_bytes(source: &GifSource) -> ReadreelResult<Vec<u8>> {
    match source {
        GifSource::Bytes(bytes) => Ok(bytes.clone()),
        GifSource::Path(path) => std::fs::read(path).map_err(|e| {
            ReadreelError::fetch(format!("failed to read gif '{}': {e}", path.display()))
        }),
        GifSource::Url(url) => {
            let response = reqwest::blocking::get(url)
                .map_err(|e| ReadreelError::fetch(format!("gif request to '{url}' failed: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ReadreelError::fetch(format!(
                    "gif request to '{url}' returned {status}"
                )));
            }
            let bytes = response
                .bytes()
                .map_err(|e| ReadreelError::fetch(format!("reading gif body failed: {e}")))?;
            Ok(bytes.to_vec())
        }
    }
}
