//! Text decoding of non-textual response bodies.

use crate::record::ResponseBody;
use common::{DevToolsError, DevToolsResult};
use encoding_rs::Encoding;

/// Reads a response body as text.
pub trait TextReader: Send + Sync {
    fn read_text(&self, body: &ResponseBody) -> DevToolsResult<String>;
}

/// [`TextReader`] decoding binary bodies with a fixed character encoding.
///
/// Malformed input is an error rather than being replaced, so a failed
/// decode leaves the displayed response untouched.
#[derive(Clone, Copy, Debug)]
pub struct EncodingTextReader {
    encoding: &'static Encoding,
}

impl EncodingTextReader {
    /// UTF-8 reader.
    pub fn utf8() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
        }
    }

    /// Reader for a WHATWG encoding label such as `"utf-16le"` or `"latin1"`.
    pub fn for_label(label: &str) -> DevToolsResult<Self> {
        Encoding::for_label(label.trim().as_bytes())
            .map(|encoding| Self { encoding })
            .ok_or_else(|| DevToolsError::decode(format!("unknown encoding label: {}", label)))
    }

    /// Name of the encoding in use.
    pub fn encoding_name(&self) -> &'static str {
        self.encoding.name()
    }
}

impl Default for EncodingTextReader {
    fn default() -> Self {
        Self::utf8()
    }
}

impl TextReader for EncodingTextReader {
    fn read_text(&self, body: &ResponseBody) -> DevToolsResult<String> {
        match body {
            ResponseBody::Text(text) => Ok(text.clone()),
            ResponseBody::Json(value) => Ok(serde_json::to_string(value)?),
            ResponseBody::Binary(bytes) => {
                let (text, had_errors) = self.encoding.decode_with_bom_removal(bytes);
                if had_errors {
                    return Err(DevToolsError::decode(format!(
                        "body is not valid {}",
                        self.encoding.name()
                    )));
                }
                Ok(text.into_owned())
            }
        }
    }
}
