//! Modbus RTU / TCP 帧解析（按从站应答解析）。
//!
//! RTU: `unit fc pdu.. crc_lo crc_hi`
//! TCP: `tid(2) pid(2)=0 len(2) unit fc pdu..`

use crate::DecodeError;
use domain::DecodedMessage;
use serde_json::Value;

const MBAP_LEN: usize = 6;

pub(super) fn decode_rtu(payload: &[u8]) -> Result<DecodedMessage, DecodeError> {
    if payload.len() < 4 {
        return Err(DecodeError::Frame(format!(
            "modbus rtu frame too short: {} bytes",
            payload.len()
        )));
    }
    let (body, tail) = payload.split_at(payload.len() - 2);
    let expected = crc16(body);
    let actual = u16::from_le_bytes([tail[0], tail[1]]);
    if expected != actual {
        return Err(DecodeError::Checksum { expected, actual });
    }

    let mut message = DecodedMessage::new();
    message.insert("protocol".to_string(), Value::from("modbus_rtu"));
    message.insert("unit".to_string(), Value::from(body[0]));
    decode_pdu(&body[1..], &mut message)?;
    Ok(message)
}

pub(super) fn decode_tcp(payload: &[u8]) -> Result<DecodedMessage, DecodeError> {
    if payload.len() < MBAP_LEN + 2 {
        return Err(DecodeError::Frame(format!(
            "modbus tcp frame too short: {} bytes",
            payload.len()
        )));
    }
    let transaction = u16::from_be_bytes([payload[0], payload[1]]);
    let protocol = u16::from_be_bytes([payload[2], payload[3]]);
    let length = u16::from_be_bytes([payload[4], payload[5]]) as usize;
    if protocol != 0 {
        return Err(DecodeError::Frame(format!(
            "modbus tcp protocol id {} is not 0",
            protocol
        )));
    }
    if length != payload.len() - MBAP_LEN {
        return Err(DecodeError::Frame(format!(
            "modbus tcp length {} does not match {} remaining bytes",
            length,
            payload.len() - MBAP_LEN
        )));
    }

    let mut message = DecodedMessage::new();
    message.insert("protocol".to_string(), Value::from("modbus_tcp"));
    message.insert("transaction".to_string(), Value::from(transaction));
    message.insert("unit".to_string(), Value::from(payload[MBAP_LEN]));
    decode_pdu(&payload[MBAP_LEN + 1..], &mut message)?;
    Ok(message)
}

fn decode_pdu(pdu: &[u8], message: &mut DecodedMessage) -> Result<(), DecodeError> {
    let function = *pdu
        .first()
        .ok_or_else(|| DecodeError::Frame("missing function code".to_string()))?;
    message.insert("function".to_string(), Value::from(function & 0x7F));

    if function & 0x80 != 0 {
        let code = pdu
            .get(1)
            .ok_or_else(|| DecodeError::Frame("missing exception code".to_string()))?;
        message.insert("exception".to_string(), Value::from(*code));
        return Ok(());
    }

    let body = &pdu[1..];
    match function {
        0x01..=0x04 => {
            let count = *body
                .first()
                .ok_or_else(|| DecodeError::Frame("missing byte count".to_string()))?
                as usize;
            let data = &body[1..];
            if data.len() != count {
                return Err(DecodeError::Frame(format!(
                    "byte count {} does not match {} data bytes",
                    count,
                    data.len()
                )));
            }
            if function >= 0x03 {
                if count % 2 != 0 {
                    return Err(DecodeError::Frame(format!(
                        "odd register byte count {}",
                        count
                    )));
                }
                let registers: Vec<Value> = data
                    .chunks_exact(2)
                    .map(|word| Value::from(u16::from_be_bytes([word[0], word[1]])))
                    .collect();
                message.insert("registers".to_string(), Value::Array(registers));
            } else {
                let bits: Vec<Value> = data
                    .iter()
                    .flat_map(|byte| (0..8).map(move |bit| Value::from(byte >> bit & 1 == 1)))
                    .collect();
                message.insert("bits".to_string(), Value::Array(bits));
            }
            message.insert("data".to_string(), Value::from(hex::encode(data)));
        }
        0x05 | 0x06 | 0x0F | 0x10 => {
            if body.len() < 4 {
                return Err(DecodeError::Frame("write echo too short".to_string()));
            }
            message.insert(
                "address".to_string(),
                Value::from(u16::from_be_bytes([body[0], body[1]])),
            );
            message.insert(
                "value".to_string(),
                Value::from(u16::from_be_bytes([body[2], body[3]])),
            );
        }
        _ => {
            message.insert("data".to_string(), Value::from(hex::encode(body)));
        }
    }
    Ok(())
}

/// Modbus CRC-16（多项式 0xA001，初值 0xFFFF）。
pub(crate) fn crc16(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in bytes {
        crc ^= *byte as u16;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
        }
    }
    crc
}
