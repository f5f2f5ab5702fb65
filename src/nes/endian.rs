//! Fixed byte-order conversions for persisted multi-byte fields.
//!
//! Save states must load on any host, so every multi-byte register goes
//! through these instead of being copied in native order.

pub fn get_le16(bytes: &[u8; 2]) -> u16 {
    (bytes[1] as u16) << 8 | bytes[0] as u16
}

pub fn get_be16(bytes: &[u8; 2]) -> u16 {
    (bytes[0] as u16) << 8 | bytes[1] as u16
}

pub fn get_le32(bytes: &[u8; 4]) -> u32 {
    (bytes[3] as u32) << 24 | (bytes[2] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[0] as u32
}

pub fn get_be32(bytes: &[u8; 4]) -> u32 {
    (bytes[0] as u32) << 24 | (bytes[1] as u32) << 16 | (bytes[2] as u32) << 8 | bytes[3] as u32
}

pub fn set_le16(out: &mut [u8; 2], n: u16) {
    out[1] = (n >> 8) as u8;
    out[0] = n as u8;
}

pub fn set_be16(out: &mut [u8; 2], n: u16) {
    out[0] = (n >> 8) as u8;
    out[1] = n as u8;
}

pub fn set_le32(out: &mut [u8; 4], n: u32) {
    out[3] = (n >> 24) as u8;
    out[2] = (n >> 16) as u8;
    out[1] = (n >> 8) as u8;
    out[0] = n as u8;
}

pub fn set_be32(out: &mut [u8; 4], n: u32) {
    out[0] = (n >> 24) as u8;
    out[1] = (n >> 16) as u8;
    out[2] = (n >> 8) as u8;
    out[3] = n as u8;
}
