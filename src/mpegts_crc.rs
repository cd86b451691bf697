//! CRC-32/MPEG-2, as used to protect PSI sections.
//!
//! Polynomial `0x04c11db7`, initial value `0xffffffff`, no reflection and no final XOR.  Because
//! of those parameters, running the checksum over a whole section *including* its trailing
//! `CRC_32` field yields zero when the section is intact.

const POLYNOMIAL: u32 = 0x04c1_1db7;

const TABLE: [u32; 256] = make_table();

const fn make_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

pub fn sum32(data: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for &b in data {
        let index = ((crc >> 24) ^ u32::from(b)) & 0xff;
        crc = (crc << 8) ^ TABLE[index as usize];
    }
    crc
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(sum32(&[0x01, 0x01]), 0xd66f_b816);
        assert_eq!(sum32(b"123456789"), 0x0376_e6e7);
        assert_eq!(sum32(&[]), 0xffff_ffff);
    }

    #[test]
    fn self_check_is_zero() {
        let mut data = b"123456789".to_vec();
        let crc = sum32(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(sum32(&data), 0);
        data[3] ^= 0x10;
        assert_ne!(sum32(&data), 0);
    }
}
