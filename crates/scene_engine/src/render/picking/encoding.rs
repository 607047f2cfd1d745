//! Object id packing into RGBA8 texels

/// Decoded value of the cleared background
pub const NO_OBJECT: u32 = 0;

/// Pack an id little-endian: R = bits 0..8, A = bits 24..32
pub fn encode_object_id(id: u32) -> [u8; 4] {
    id.to_le_bytes()
}

/// Rebuild an id from a texel, `r + g << 8 + b << 16 + a << 24`
pub fn decode_object_id(texel: [u8; 4]) -> u32 {
    u32::from(texel[0]) | u32::from(texel[1]) << 8 | u32::from(texel[2]) << 16 | u32::from(texel[3]) << 24
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_42_round_trip() {
        let texel = encode_object_id(42);
        assert_eq!(texel, [42, 0, 0, 0]);
        assert_eq!(decode_object_id(texel), 42);
    }

    #[test]
    fn test_byte_order() {
        assert_eq!(encode_object_id(0x0403_0201), [1, 2, 3, 4]);
        assert_eq!(decode_object_id([0xff, 0xff, 0xff, 0xff]), u32::MAX);
        assert_eq!(decode_object_id([0, 0, 0, 0]), NO_OBJECT);
    }
}
