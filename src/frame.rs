//! Modbus RTU frame codec for the inverter serial link
//!
//! Builds and validates framed register requests/responses, computes the
//! CRC16 trailer, detects frame completion in a growing byte stream and
//! decodes register payloads. Everything here is pure so the protocol layer
//! can be tested without a serial port.

use crate::error::{HeliosError, Result};

/// Read holding registers
pub const FN_READ_HOLDING: u8 = 0x03;
/// Read input registers
pub const FN_READ_INPUT: u8 = 0x04;
/// Write a single register
pub const FN_WRITE_SINGLE: u8 = 0x06;
/// Write multiple registers
pub const FN_WRITE_MULTIPLE: u8 = 0x10;

/// Exception responses echo the function code with the high bit set
const EXCEPTION_FLAG: u8 = 0x80;

/// Exception responses are always unit + function + code + CRC
const EXCEPTION_FRAME_LEN: usize = 5;

/// Write echo responses are always unit + function + address + quantity/value + CRC
const WRITE_ECHO_FRAME_LEN: usize = 8;

/// A parsed response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Responding unit id
    pub unit_id: u8,

    /// Function code of the response
    pub function: u8,

    /// Payload. For read responses this is the register bytes with the
    /// byte-count prefix already stripped; for other functions it is
    /// everything between the function code and the CRC.
    pub data: Vec<u8>,
}

/// Compute the CRC16 over `bytes` (polynomial 0xA001, seed 0xFFFF).
///
/// Returns the two checksum bytes in transmission order (low, high).
pub fn crc16(bytes: &[u8]) -> (u8, u8) {
    let mut crc: u16 = 0xFFFF;
    for &byte in bytes {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    ((crc & 0x00FF) as u8, (crc >> 8) as u8)
}

fn push_crc(frame: &mut Vec<u8>) {
    let (low, high) = crc16(frame);
    frame.push(low);
    frame.push(high);
}

/// Build a read request frame: 6-byte header plus CRC.
///
/// Only the read function codes are accepted.
pub fn build_read_frame(unit_id: u8, function: u8, start: u16, quantity: u16) -> Result<Vec<u8>> {
    if function != FN_READ_HOLDING && function != FN_READ_INPUT {
        return Err(HeliosError::malformed(format!(
            "Function {:#04x} is not a read function",
            function
        )));
    }

    let mut frame = Vec::with_capacity(8);
    frame.push(unit_id);
    frame.push(function);
    frame.extend_from_slice(&start.to_be_bytes());
    frame.extend_from_slice(&quantity.to_be_bytes());
    push_crc(&mut frame);
    Ok(frame)
}

/// Build a write request frame.
///
/// Supports the single-register layout (function 0x06, exactly one value)
/// and the multi-register layout (function 0x10, quantity and byte-count
/// prefix before the values).
pub fn build_write_frame(unit_id: u8, function: u8, start: u16, values: &[u16]) -> Result<Vec<u8>> {
    match function {
        FN_WRITE_SINGLE => {
            if values.len() != 1 {
                return Err(HeliosError::malformed(
                    "Single-register write takes exactly one value",
                ));
            }
            let mut frame = Vec::with_capacity(8);
            frame.push(unit_id);
            frame.push(function);
            frame.extend_from_slice(&start.to_be_bytes());
            frame.extend_from_slice(&values[0].to_be_bytes());
            push_crc(&mut frame);
            Ok(frame)
        }
        FN_WRITE_MULTIPLE => {
            if values.is_empty() {
                return Err(HeliosError::malformed(
                    "Multi-register write takes at least one value",
                ));
            }
            let byte_count = values.len() * 2;
            if byte_count > u8::MAX as usize {
                return Err(HeliosError::malformed("Multi-register write too large"));
            }
            let mut frame = Vec::with_capacity(9 + byte_count);
            frame.push(unit_id);
            frame.push(function);
            frame.extend_from_slice(&start.to_be_bytes());
            frame.extend_from_slice(&(values.len() as u16).to_be_bytes());
            frame.push(byte_count as u8);
            for value in values {
                frame.extend_from_slice(&value.to_be_bytes());
            }
            push_crc(&mut frame);
            Ok(frame)
        }
        _ => Err(HeliosError::malformed(format!(
            "Function {:#04x} is not a write function",
            function
        ))),
    }
}

/// Whether `buffer` holds a complete, CRC-verifiable response frame.
///
/// Returns false while bytes are still arriving. Exception responses are a
/// fixed 5 bytes, write echoes a fixed 8 bytes, and read responses run
/// `3 + declared byte count + 2` (the byte count only becomes visible once
/// three bytes have arrived).
pub fn frame_complete(buffer: &[u8]) -> bool {
    if buffer.len() < EXCEPTION_FRAME_LEN {
        return false;
    }

    let function = buffer[1];
    if function & EXCEPTION_FLAG != 0 {
        return true;
    }

    match function {
        FN_WRITE_SINGLE | FN_WRITE_MULTIPLE => buffer.len() >= WRITE_ECHO_FRAME_LEN,
        _ => {
            let byte_count = buffer[2] as usize;
            buffer.len() >= 3 + byte_count + 2
        }
    }
}

/// Parse and validate a complete response frame.
///
/// The CRC always covers the frame excluding its own trailing two bytes.
pub fn parse_response(buffer: &[u8]) -> Result<ResponseFrame> {
    if buffer.len() < EXCEPTION_FRAME_LEN {
        return Err(HeliosError::malformed(format!(
            "Frame too short: {} bytes",
            buffer.len()
        )));
    }

    let body = &buffer[..buffer.len() - 2];
    let (low, high) = crc16(body);
    let computed = u16::from_le_bytes([low, high]);
    let received = u16::from_le_bytes([buffer[buffer.len() - 2], buffer[buffer.len() - 1]]);
    if computed != received {
        return Err(HeliosError::CrcMismatch { computed, received });
    }

    let unit_id = buffer[0];
    let function = buffer[1];

    if function & EXCEPTION_FLAG != 0 {
        return Err(HeliosError::ExceptionResponse { code: buffer[2] });
    }

    let data = match function {
        FN_READ_HOLDING | FN_READ_INPUT => {
            let byte_count = buffer[2] as usize;
            if buffer.len() != 3 + byte_count + 2 {
                return Err(HeliosError::malformed(format!(
                    "Declared byte count {} does not match frame length {}",
                    byte_count,
                    buffer.len()
                )));
            }
            buffer[3..3 + byte_count].to_vec()
        }
        _ => buffer[2..buffer.len() - 2].to_vec(),
    };

    Ok(ResponseFrame {
        unit_id,
        function,
        data,
    })
}

/// Decode a register payload into 16-bit values (big-endian pairs).
///
/// A dangling odd trailing byte is dropped, not padded.
pub fn decode_registers(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}
