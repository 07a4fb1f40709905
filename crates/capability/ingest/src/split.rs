//! TCP 分包：把连接字节流切成独立载荷。
//!
//! 内置四种规则（原样 / 分隔符 / 定长 / 长度字段），也可以传入任意闭包。
//! 切分错误只影响当前连接。

use bytes::{Buf, Bytes, BytesMut};
use domain::SplitConfig;
use tokio_util::codec::Decoder;

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame too large: {size} > {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("invalid split rule: {0}")]
    Invalid(String),

    /// 连接关闭时缓冲区中仍有不完整的帧
    #[error("incomplete frame at eof: {0} bytes")]
    Incomplete(usize),
}

/// 分包规则。
///
/// `split` 返回 `Ok(None)` 表示需要更多数据。
pub trait Splitter: Send {
    fn split(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, SplitError>;

    /// 连接关闭时调用；默认把剩余字节视为不完整帧。
    fn split_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, SplitError> {
        match self.split(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => {
                let remaining = buf.len();
                buf.clear();
                Err(SplitError::Incomplete(remaining))
            }
        }
    }
}

impl<F> Splitter for F
where
    F: FnMut(&mut BytesMut) -> Result<Option<Bytes>, SplitError> + Send,
{
    fn split(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, SplitError> {
        self(buf)
    }
}

/// 按配置构建内置分包规则。
pub fn from_config(config: &SplitConfig) -> Result<Box<dyn Splitter>, SplitError> {
    let splitter: Box<dyn Splitter> = match config {
        SplitConfig::Raw { max_frame } => Box::new(Raw::new(*max_frame)),
        SplitConfig::Delimiter {
            delimiter,
            keep,
            max_frame,
        } => {
            if delimiter.is_empty() {
                Box::new(Raw::new(*max_frame))
            } else {
                Box::new(Delimiter::new(delimiter.as_bytes(), *keep, *max_frame)?)
            }
        }
        SplitConfig::FixedLength { length } => Box::new(FixedLength::new(*length)?),
        SplitConfig::LengthPrefixed {
            width,
            offset,
            adjust,
            little_endian,
            max_frame,
        } => Box::new(LengthPrefixed::new(
            *width,
            *offset,
            *adjust,
            *little_endian,
            *max_frame,
        )?),
    };
    Ok(splitter)
}

/// 把分包规则接入 `FramedRead`。
pub struct SplitCodec {
    splitter: Box<dyn Splitter>,
}

impl SplitCodec {
    pub fn new(splitter: Box<dyn Splitter>) -> Self {
        Self { splitter }
    }
}

impl Decoder for SplitCodec {
    type Item = Bytes;
    type Error = SplitError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, SplitError> {
        self.splitter.split(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, SplitError> {
        self.splitter.split_eof(src)
    }
}

/// 原样：缓冲区中已有的数据即为一帧（超过上限时按上限切块）。
#[derive(Debug, Clone)]
pub struct Raw {
    max_frame: usize,
}

impl Raw {
    pub fn new(max_frame: usize) -> Self {
        Self {
            max_frame: max_frame.max(1),
        }
    }
}

impl Splitter for Raw {
    fn split(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, SplitError> {
        if buf.is_empty() {
            return Ok(None);
        }
        let take = buf.len().min(self.max_frame);
        Ok(Some(buf.split_to(take).freeze()))
    }
}

/// 分隔符切分；空帧被跳过，连接关闭时剩余字节作为最后一帧。
#[derive(Debug, Clone)]
pub struct Delimiter {
    delimiter: Vec<u8>,
    keep: bool,
    max_frame: usize,
    // 已确认不含分隔符的前缀长度
    scanned: usize,
}

impl Delimiter {
    pub fn new(delimiter: &[u8], keep: bool, max_frame: usize) -> Result<Self, SplitError> {
        if delimiter.is_empty() {
            return Err(SplitError::Invalid("delimiter is empty".to_string()));
        }
        Ok(Self {
            delimiter: delimiter.to_vec(),
            keep,
            max_frame,
            scanned: 0,
        })
    }

    fn find(&self, buf: &[u8]) -> Option<usize> {
        let start = self.scanned.saturating_sub(self.delimiter.len() - 1);
        buf[start..]
            .windows(self.delimiter.len())
            .position(|window| window == self.delimiter.as_slice())
            .map(|pos| start + pos)
    }
}

impl Splitter for Delimiter {
    fn split(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, SplitError> {
        loop {
            let Some(pos) = self.find(buf) else {
                if buf.len() > self.max_frame {
                    let size = buf.len();
                    buf.clear();
                    self.scanned = 0;
                    return Err(SplitError::FrameTooLarge {
                        size,
                        max: self.max_frame,
                    });
                }
                self.scanned = buf.len();
                return Ok(None);
            };

            self.scanned = 0;
            let end = pos + self.delimiter.len();
            let mut frame = buf.split_to(end);
            if !self.keep {
                frame.truncate(pos);
            }
            if pos == 0 {
                continue;
            }
            if frame.len() > self.max_frame {
                return Err(SplitError::FrameTooLarge {
                    size: frame.len(),
                    max: self.max_frame,
                });
            }
            return Ok(Some(frame.freeze()));
        }
    }

    fn split_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, SplitError> {
        if let Some(frame) = self.split(buf)? {
            return Ok(Some(frame));
        }
        self.scanned = 0;
        if buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(buf.split().freeze()))
    }
}

/// 定长切分。
#[derive(Debug, Clone)]
pub struct FixedLength {
    length: usize,
}

impl FixedLength {
    pub fn new(length: usize) -> Result<Self, SplitError> {
        if length == 0 {
            return Err(SplitError::Invalid("fixed length must be > 0".to_string()));
        }
        Ok(Self { length })
    }
}

impl Splitter for FixedLength {
    fn split(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, SplitError> {
        if buf.len() < self.length {
            return Ok(None);
        }
        Ok(Some(buf.split_to(self.length).freeze()))
    }
}

/// 长度字段切分：帧长 = offset + width + 长度值 + adjust。
#[derive(Debug, Clone)]
pub struct LengthPrefixed {
    width: usize,
    offset: usize,
    adjust: i64,
    little_endian: bool,
    max_frame: usize,
}

impl LengthPrefixed {
    pub fn new(
        width: u8,
        offset: usize,
        adjust: i64,
        little_endian: bool,
        max_frame: usize,
    ) -> Result<Self, SplitError> {
        if !matches!(width, 1 | 2 | 4) {
            return Err(SplitError::Invalid(format!(
                "length field width must be 1, 2 or 4, got {width}"
            )));
        }
        Ok(Self {
            width: width as usize,
            offset,
            adjust,
            little_endian,
            max_frame,
        })
    }

    fn read_len(&self, field: &[u8]) -> u64 {
        let mut field = field;
        match (self.width, self.little_endian) {
            (1, _) => field.get_u8() as u64,
            (2, false) => field.get_u16() as u64,
            (2, true) => field.get_u16_le() as u64,
            (_, false) => field.get_u32() as u64,
            (_, true) => field.get_u32_le() as u64,
        }
    }
}

impl Splitter for LengthPrefixed {
    fn split(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, SplitError> {
        let header = self.offset + self.width;
        if buf.len() < header {
            return Ok(None);
        }
        let len = self.read_len(&buf[self.offset..header]);
        let total = header as i64 + len as i64 + self.adjust;
        if total < header as i64 || total == 0 {
            buf.clear();
            return Err(SplitError::Invalid(format!("length field yields frame of {total} bytes")));
        }
        let total = total as usize;
        if total > self.max_frame {
            buf.clear();
            return Err(SplitError::FrameTooLarge {
                size: total,
                max: self.max_frame,
            });
        }
        if buf.len() < total {
            buf.reserve(total - buf.len());
            return Ok(None);
        }
        Ok(Some(buf.split_to(total).freeze()))
    }
}
