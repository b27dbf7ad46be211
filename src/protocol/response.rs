//! Reply formatter for the slash protocol
//!
//! Reply grammar, one LF-terminated line each (the help block excepted):
//!
//! ```text
//! data/<id>/<name>/<email>/<phone>/<cash>
//! ok
//! fail
//! fail: <reason>
//! error: <reason>
//! ```

use crate::storage::UserRecord;
use bytes::BytesMut;
use itoa::Buffer;

/// Fixed help block sent for unknown commands.
const HELP: &str = "error: 未知命令或参数错误\n\
                    可用命令:\n\
                    \x20 get/<id或name>              - 获取用户信息\n\
                    \x20 set/<field>/<id或name>/<value> - 设置用户信息\n\
                    字段(field)支持: name, email, phone, cash\n\
                    cash字段支持负数表示取款\n";

/// Response writer accumulating reply bytes for one connection turn.
pub struct ResponseWriter {
    buf: BytesMut,
}

impl ResponseWriter {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Take the buffer, leaving an empty buffer in its place
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write a data line for a get hit
    pub fn data(&mut self, value: &UserRecord) {
        let mut itoa_buf = Buffer::new();
        self.buf.extend_from_slice(b"data/");
        self.buf
            .extend_from_slice(itoa_buf.format(value.id).as_bytes());
        self.buf.extend_from_slice(b"/");
        self.buf.extend_from_slice(value.name.as_bytes());
        self.buf.extend_from_slice(b"/");
        self.buf.extend_from_slice(value.email.as_bytes());
        self.buf.extend_from_slice(b"/");
        self.buf.extend_from_slice(value.phone.as_bytes());
        self.buf.extend_from_slice(b"/");
        self.buf
            .extend_from_slice(itoa_buf.format(value.cash).as_bytes());
        self.buf.extend_from_slice(b"\n");
    }

    /// Write an `ok` response
    pub fn ok(&mut self) {
        self.buf.extend_from_slice(b"ok\n");
    }

    /// Write a bare `fail` response (get miss)
    pub fn fail(&mut self) {
        self.buf.extend_from_slice(b"fail\n");
    }

    /// Write a `fail: <reason>` response (validation failure)
    pub fn fail_with(&mut self, reason: &str) {
        self.buf.extend_from_slice(b"fail: ");
        self.buf.extend_from_slice(reason.as_bytes());
        self.buf.extend_from_slice(b"\n");
    }

    /// Write an `error: <reason>` response (malformed input)
    pub fn error(&mut self, reason: &str) {
        self.buf.extend_from_slice(b"error: ");
        self.buf.extend_from_slice(reason.as_bytes());
        self.buf.extend_from_slice(b"\n");
    }

    /// Write the fixed help block
    pub fn help(&mut self) {
        self.buf.extend_from_slice(HELP.as_bytes());
    }

    /// Write an arbitrary line (echo handler)
    pub fn line(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
        self.buf.extend_from_slice(b"\n");
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new(256)
    }
}
