//! DL/T 645 帧解析
//!
//! ```text
//! [FE..] 68 A0..A5 68 C L DATA(L) CS 16
//! ```
//! 地址为 6 字节 BCD（低字节在前），数据域每字节加 0x33 传输，CS 为两个 68 之间（含）到数据域末尾的字节和。

use crate::DecodeError;
use domain::DecodedMessage;
use serde_json::Value;

const START: u8 = 0x68;
const END: u8 = 0x16;
const WAKE: u8 = 0xFE;
const OFFSET: u8 = 0x33;
const HEADER_LEN: usize = 10;

pub(super) fn decode(payload: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let start = payload
        .iter()
        .position(|b| *b != WAKE)
        .ok_or_else(|| DecodeError::Frame("empty dlt645 frame".to_string()))?;
    let frame = &payload[start..];

    if frame.len() < HEADER_LEN + 2 {
        return Err(DecodeError::Frame(format!(
            "dlt645 frame too short: {} bytes",
            frame.len()
        )));
    }
    if frame[0] != START || frame[7] != START {
        return Err(DecodeError::Frame("dlt645 start marker missing".to_string()));
    }

    let control = frame[8];
    let len = frame[9] as usize;
    let expected_total = HEADER_LEN + len + 2;
    if frame.len() < expected_total {
        return Err(DecodeError::Frame(format!(
            "dlt645 data length {} exceeds frame",
            len
        )));
    }
    if frame[expected_total - 1] != END {
        return Err(DecodeError::Frame("dlt645 end marker missing".to_string()));
    }

    let checksum = frame[..HEADER_LEN + len]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    let received = frame[HEADER_LEN + len];
    if checksum != received {
        return Err(DecodeError::Checksum {
            expected: checksum as u16,
            actual: received as u16,
        });
    }

    let address: String = frame[1..7]
        .iter()
        .rev()
        .map(|b| format!("{:02x}", b))
        .collect();
    let data: Vec<u8> = frame[HEADER_LEN..HEADER_LEN + len]
        .iter()
        .map(|b| b.wrapping_sub(OFFSET))
        .collect();

    let mut message = DecodedMessage::new();
    message.insert("protocol".to_string(), Value::from("dlt645"));
    message.insert("address".to_string(), Value::from(address));
    message.insert("control".to_string(), Value::from(control));
    message.insert(
        "direction".to_string(),
        Value::from(if control & 0x80 != 0 { "response" } else { "request" }),
    );
    message.insert("abnormal".to_string(), Value::from(control & 0x40 != 0));
    message.insert("length".to_string(), Value::from(len));
    // 2007 版数据标识 DI3..DI0，传输时低字节在前
    if data.len() >= 4 {
        let data_id: String = data[..4].iter().rev().map(|b| format!("{:02x}", b)).collect();
        message.insert("data_id".to_string(), Value::from(data_id));
        message.insert("data".to_string(), Value::from(hex::encode(&data[4..])));
    } else {
        message.insert("data".to_string(), Value::from(hex::encode(&data)));
    }
    Ok(message)
}
