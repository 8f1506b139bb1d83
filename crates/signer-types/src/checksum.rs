//! CRC32C (Castagnoli) checksums.
//!
//! Remote key services attach a CRC32C of the payload to their responses so
//! that corruption in transit can be detected by the client.

use crc::{Crc, CRC_32_ISCSI};

const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Computes the CRC32C checksum of `data`.
pub fn crc32c(data: &[u8]) -> u32 {
	CASTAGNOLI.checksum(data)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_crc32c_check_value() {
		assert_eq!(crc32c(b"123456789"), 0xE306_9283);
	}

	#[test]
	fn test_crc32c_detects_truncation() {
		let data = b"-----BEGIN PUBLIC KEY-----";
		assert_ne!(crc32c(data), crc32c(&data[..data.len() - 1]));
	}
}
