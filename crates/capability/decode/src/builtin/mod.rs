//! 固定协议解析器集合。
//!
//! 只解析帧结构（起止标志、地址、功能码、校验与数据域），寄存器含义由用户脚本处理。

mod dlt645;
mod modbus;

use crate::{DecodeError, Decoder};
use async_trait::async_trait;
use domain::DecodedMessage;

/// 内置解析器（封闭集合，按 key 选择）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinDecoder {
    Pass,
    Dlt645,
    ModbusRtu,
    ModbusTcp,
}

impl BuiltinDecoder {
    pub const PASS: &'static str = "pass";
    pub const DLT645: &'static str = "dlt645";
    pub const MODBUS_RTU: &'static str = "modbus_rtu";
    pub const MODBUS_TCP: &'static str = "modbus_tcp";

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            Self::PASS | "" => Some(Self::Pass),
            Self::DLT645 => Some(Self::Dlt645),
            Self::MODBUS_RTU => Some(Self::ModbusRtu),
            Self::MODBUS_TCP => Some(Self::ModbusTcp),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Pass => Self::PASS,
            Self::Dlt645 => Self::DLT645,
            Self::ModbusRtu => Self::MODBUS_RTU,
            Self::ModbusTcp => Self::MODBUS_TCP,
        }
    }

    /// 同步解析。
    pub fn decode_frame(self, payload: &[u8]) -> Result<DecodedMessage, DecodeError> {
        match self {
            Self::Pass => Ok(DecodedMessage::new()),
            Self::Dlt645 => dlt645::decode(payload),
            Self::ModbusRtu => modbus::decode_rtu(payload),
            Self::ModbusTcp => modbus::decode_tcp(payload),
        }
    }
}

#[async_trait]
impl Decoder for BuiltinDecoder {
    async fn decode(&self, payload: &[u8]) -> Result<DecodedMessage, DecodeError> {
        self.decode_frame(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        for decoder in [
            BuiltinDecoder::Pass,
            BuiltinDecoder::Dlt645,
            BuiltinDecoder::ModbusRtu,
            BuiltinDecoder::ModbusTcp,
        ] {
            assert_eq!(BuiltinDecoder::from_key(decoder.key()), Some(decoder));
        }
        assert_eq!(BuiltinDecoder::from_key("script"), None);
        assert_eq!(BuiltinDecoder::from_key("script3"), None);
    }
}
