//! NIP-13 difficulty scoring: leading zero bits of a hex identifier.

/// Count the leading zero bits of a hex identifier.
///
/// Walks the id nibble by nibble: each leading `0` character contributes
/// 4 bits, and the first non-zero nibble contributes its own leading
/// zeros within those 4 bits. The result is bounded by
/// `4 * id.len()`. Non-hex characters terminate the count.
///
/// # Example
///
/// ```rust
/// use powstr_core::leading_zero_bits;
///
/// assert_eq!(leading_zero_bits("8fff"), 0);
/// assert_eq!(leading_zero_bits("1fff"), 3);  // 0001 ...
/// assert_eq!(leading_zero_bits("002f"), 10); // 0000 0000 0010 ...
/// ```
#[inline]
pub fn leading_zero_bits(id: &str) -> u32 {
    let mut bits = 0;
    for c in id.chars() {
        match c.to_digit(16) {
            Some(0) => bits += 4,
            // A nibble occupies the low 4 bits of the u32.
            Some(nibble) => {
                bits += nibble.leading_zeros() - 28;
                break;
            }
            None => break,
        }
    }
    bits
}

/// Check whether an identifier meets the required difficulty.
///
/// Threshold semantics: an id with more leading zero bits than requested
/// still qualifies, matching the "proof of work of at least N bits"
/// reading of the nonce tag's declared target.
///
/// # Example
///
/// ```rust
/// use powstr_core::meets_difficulty;
///
/// let id = "000fab"; // 12 leading zero bits
/// assert!(meets_difficulty(id, 8));
/// assert!(meets_difficulty(id, 12));
/// assert!(!meets_difficulty(id, 13));
/// ```
#[inline]
pub fn meets_difficulty(id: &str, difficulty: u32) -> bool {
    leading_zero_bits(id) >= difficulty
}
