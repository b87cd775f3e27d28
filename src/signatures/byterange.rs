//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset where the signature value begins
//! - `offset2` = byte offset where the signature value ends
//! - `length2` = remaining bytes to end of file
//!
//! The signature value is a hex-encoded string within `<` and `>` delimiters.
//!
//! The signature dictionary is serialized with placeholder values for both
//! entries. After the document is written, [`ByteRangeCalculator::locate`]
//! finds them and the real values are patched in place without changing
//! the file length.

use crate::error::{Error, Result};

/// Value used for the unknown ByteRange entries before the file is written.
///
/// Ten digits leave room for any offset the real array can hold.
pub const BYTE_RANGE_PLACEHOLDER: i64 = 9_999_999_999;

/// Positions of the signature placeholders in a serialized document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderLocation {
    /// Offset just after the ByteRange array's `[`
    pub byte_range_start: usize,
    /// Offset of the ByteRange array's `]`
    pub byte_range_end: usize,
    /// Offset of the `/Contents` value's `<`
    pub contents_offset: usize,
}

/// Calculator for PDF signature byte ranges.
#[derive(Debug, Clone, Copy)]
pub struct ByteRangeCalculator {
    /// Size of the placeholder for the signature value (hex digits + 2 for angle brackets)
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Create a new ByteRange calculator with the specified signature size.
    ///
    /// # Arguments
    ///
    /// * `estimated_signature_size` - Estimated size of the DER-encoded signature in bytes
    ///
    /// The placeholder size will be calculated as: (signature_size * 2) + 2
    /// because the signature is hex-encoded and enclosed in angle brackets.
    pub fn new(estimated_signature_size: usize) -> Self {
        // Each byte becomes 2 hex characters, plus 2 for < and >
        let placeholder_size = estimated_signature_size * 2 + 2;
        Self { placeholder_size }
    }

    /// Create a ByteRange calculator with a specific placeholder size.
    pub fn with_placeholder_size(placeholder_size: usize) -> Self {
        Self { placeholder_size }
    }

    /// Get the placeholder size (for the /Contents value).
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// Number of raw signature bytes the placeholder can hold.
    pub fn capacity(&self) -> usize {
        self.placeholder_size.saturating_sub(2) / 2
    }

    /// Generate a placeholder string for the signature contents.
    #[cfg(test)]
    pub(crate) fn generate_placeholder(&self) -> String {
        format!("<{}>", "0".repeat(self.placeholder_size.saturating_sub(2)))
    }

    /// The ByteRange array written before the real offsets are known.
    pub fn placeholder_byte_range() -> [i64; 4] {
        [0, BYTE_RANGE_PLACEHOLDER, BYTE_RANGE_PLACEHOLDER, BYTE_RANGE_PLACEHOLDER]
    }

    /// Calculate the ByteRange array given the position of the /Contents value.
    ///
    /// # Arguments
    ///
    /// * `file_size` - Total size of the PDF file
    /// * `contents_offset` - Byte offset where the /Contents value starts (including '<')
    ///
    /// # Returns
    ///
    /// An array `[0, before_sig, after_sig_start, after_sig_len]`
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Find the ByteRange and /Contents placeholders in a written document.
    pub fn locate(&self, pdf_data: &[u8]) -> Result<PlaceholderLocation> {
        let marker = format!(
            "{} {} {}",
            BYTE_RANGE_PLACEHOLDER, BYTE_RANGE_PLACEHOLDER, BYTE_RANGE_PLACEHOLDER
        );
        let marker_pos = find(pdf_data, marker.as_bytes(), 0).ok_or_else(|| {
            Error::ProcessingError("ByteRange placeholder not found in written document".into())
        })?;
        let open = pdf_data[..marker_pos]
            .iter()
            .rposition(|&b| b == b'[')
            .ok_or_else(|| Error::ProcessingError("malformed ByteRange placeholder".into()))?;
        let close = find(pdf_data, b"]", marker_pos)
            .ok_or_else(|| Error::ProcessingError("malformed ByteRange placeholder".into()))?;

        let mut search_from = 0;
        while let Some(key) = find(pdf_data, b"/Contents", search_from) {
            search_from = key + 1;
            let Some(offset) = Self::find_contents_offset(pdf_data, key) else {
                continue;
            };
            if self.is_placeholder_at(pdf_data, offset) {
                return Ok(PlaceholderLocation {
                    byte_range_start: open + 1,
                    byte_range_end: close,
                    contents_offset: offset,
                });
            }
        }
        Err(Error::ProcessingError(
            "signature /Contents placeholder not found in written document".into(),
        ))
    }

    fn is_placeholder_at(&self, pdf_data: &[u8], offset: usize) -> bool {
        let end = offset + self.placeholder_size;
        if self.placeholder_size < 2 || end > pdf_data.len() {
            return false;
        }
        let value = &pdf_data[offset..end];
        value[0] == b'<'
            && value[value.len() - 1] == b'>'
            && value[1..value.len() - 1].iter().all(|&b| b == b'0')
    }

    /// Overwrite the ByteRange placeholder with `byte_range`, padding with
    /// spaces so the file length is unchanged.
    pub fn write_byte_range(
        pdf_data: &mut [u8],
        location: &PlaceholderLocation,
        byte_range: &[i64; 4],
    ) -> Result<()> {
        let slot = location
            .byte_range_end
            .checked_sub(location.byte_range_start)
            .ok_or_else(|| Error::ProcessingError("malformed ByteRange placeholder".into()))?;
        let values = format!("{} {} {} {}", byte_range[0], byte_range[1], byte_range[2], byte_range[3]);
        if values.len() > slot || location.byte_range_end > pdf_data.len() {
            return Err(Error::ProcessingError(format!(
                "ByteRange {} does not fit its {}-byte placeholder",
                values, slot
            )));
        }
        let target = &mut pdf_data[location.byte_range_start..location.byte_range_end];
        target.fill(b' ');
        target[..values.len()].copy_from_slice(values.as_bytes());
        Ok(())
    }

    /// Extract the bytes to be signed from a PDF file.
    ///
    /// This returns the concatenation of the two ranges specified by ByteRange.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        if byte_range.iter().any(|&v| v < 0) {
            return Err(Error::ProcessingError(format!(
                "ByteRange has negative entries: {:?}",
                byte_range
            )));
        }
        let offset1 = byte_range[0] as usize;
        let length1 = byte_range[1] as usize;
        let offset2 = byte_range[2] as usize;
        let length2 = byte_range[3] as usize;

        // Validate ranges
        if offset1 + length1 > pdf_data.len() {
            return Err(Error::ProcessingError(format!(
                "ByteRange first range exceeds file size: {} + {} > {}",
                offset1,
                length1,
                pdf_data.len()
            )));
        }
        if offset2 + length2 > pdf_data.len() {
            return Err(Error::ProcessingError(format!(
                "ByteRange second range exceeds file size: {} + {} > {}",
                offset2,
                length2,
                pdf_data.len()
            )));
        }

        let mut signed_bytes = Vec::with_capacity(length1 + length2);
        signed_bytes.extend_from_slice(&pdf_data[offset1..offset1 + length1]);
        signed_bytes.extend_from_slice(&pdf_data[offset2..offset2 + length2]);

        Ok(signed_bytes)
    }

    /// Check if a ByteRange covers the entire document except the signature.
    ///
    /// A valid ByteRange should:
    /// - Start at offset 0
    /// - End at the file size
    /// - Have no gaps except for the signature placeholder
    pub fn validate_byte_range(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
        let offset1 = byte_range[0];
        let length1 = byte_range[1];
        let offset2 = byte_range[2];
        let length2 = byte_range[3];

        if offset1 != 0 {
            return Err(Error::ProcessingError(format!(
                "ByteRange must start at 0, got {}",
                offset1
            )));
        }

        let expected_end = file_size as i64;
        let actual_end = offset2 + length2;
        if actual_end != expected_end {
            return Err(Error::ProcessingError(format!(
                "ByteRange must end at file size {}, got {}",
                expected_end, actual_end
            )));
        }

        if length1 > offset2 {
            return Err(Error::ProcessingError(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }

        Ok(())
    }

    /// Find the /Contents value position in a signature dictionary.
    ///
    /// This searches for the pattern `/Contents <` and returns the offset
    /// of the opening angle bracket.
    pub fn find_contents_offset(pdf_data: &[u8], sig_dict_offset: usize) -> Option<usize> {
        let search_start = sig_dict_offset.min(pdf_data.len());
        let search_end = (sig_dict_offset + 4096).min(pdf_data.len());
        let search_window = &pdf_data[search_start..search_end];

        let contents_pattern = b"/Contents";
        let mut pos = 0;
        while pos + contents_pattern.len() < search_window.len() {
            if search_window[pos..].starts_with(contents_pattern) {
                let after_contents = pos + contents_pattern.len();
                for (i, &byte) in search_window.iter().enumerate().skip(after_contents) {
                    if byte == b'<' {
                        // `<<` opens a dictionary, not a string
                        if search_window.get(i + 1) == Some(&b'<') {
                            break;
                        }
                        return Some(search_start + i);
                    }
                    if !matches!(byte, b' ' | b'\t' | b'\n' | b'\r') {
                        break;
                    }
                }
            }
            pos += 1;
        }

        None
    }

    /// Replace the placeholder in the PDF with the actual signature.
    ///
    /// # Arguments
    ///
    /// * `pdf_data` - Mutable PDF file data
    /// * `contents_offset` - Byte offset where the /Contents value starts
    /// * `signature_hex` - Hex-encoded signature to insert
    pub fn insert_signature(
        &self,
        pdf_data: &mut [u8],
        contents_offset: usize,
        signature_hex: &str,
    ) -> Result<()> {
        let sig_len = signature_hex.len() + 2; // +2 for angle brackets
        if sig_len > self.placeholder_size {
            return Err(Error::ProcessingError(format!(
                "Signature ({} bytes) exceeds placeholder size ({} bytes)",
                sig_len, self.placeholder_size
            )));
        }

        // Pad with zeros to fill the placeholder
        let mut sig_value = String::with_capacity(self.placeholder_size);
        sig_value.push('<');
        sig_value.push_str(signature_hex);
        let padding_needed = (self.placeholder_size - 2) - signature_hex.len();
        sig_value.extend(std::iter::repeat('0').take(padding_needed));
        sig_value.push('>');

        if contents_offset + self.placeholder_size > pdf_data.len() {
            return Err(Error::ProcessingError(
                "Signature insertion would exceed file bounds".to_string(),
            ));
        }

        pdf_data[contents_offset..contents_offset + self.placeholder_size]
            .copy_from_slice(sig_value.as_bytes());

        Ok(())
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        // Default to 8KB signature (should be enough for most cases)
        Self::new(8192)
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written_sig_dict(calc: &ByteRangeCalculator) -> Vec<u8> {
        format!(
            "%PDF-1.7\n1 0 obj\n<</Contents 2 0 R>>\nendobj\n5 0 obj\n<</Type/Sig/ByteRange{}/Contents{}/M(D:20240101)>>\nendobj\n%%EOF\n",
            ByteRangeCalculator::format_byte_range(&ByteRangeCalculator::placeholder_byte_range()),
            calc.generate_placeholder()
        )
        .into_bytes()
    }

    #[test]
    fn test_placeholder_size() {
        let calc = ByteRangeCalculator::new(1024);
        // 1024 bytes * 2 (hex) + 2 (brackets) = 2050
        assert_eq!(calc.placeholder_size(), 2050);
        assert_eq!(calc.capacity(), 1024);
    }

    #[test]
    fn test_generate_placeholder() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let placeholder = calc.generate_placeholder();
        assert_eq!(placeholder, "<00000000>");
        assert_eq!(placeholder.len(), 10);
    }

    #[test]
    fn test_calculate_byte_range() {
        let calc = ByteRangeCalculator::with_placeholder_size(100);
        let byte_range = calc.calculate_byte_range(1000, 400);
        assert_eq!(byte_range, [0, 400, 500, 500]);
    }

    #[test]
    fn test_format_byte_range() {
        let formatted = ByteRangeCalculator::format_byte_range(&[0, 100, 200, 300]);
        assert_eq!(formatted, "[0 100 200 300]");
    }

    #[test]
    fn test_locate_skips_page_contents() {
        let calc = ByteRangeCalculator::new(16);
        let pdf = written_sig_dict(&calc);
        let location = calc.locate(&pdf).unwrap();
        assert_eq!(pdf[location.contents_offset], b'<');
        assert_eq!(pdf[location.byte_range_start - 1], b'[');
        assert_eq!(pdf[location.byte_range_end], b']');
        let text = String::from_utf8_lossy(&pdf[..location.contents_offset]);
        assert!(text.ends_with("/Contents"));
    }

    #[test]
    fn test_locate_without_placeholder() {
        let calc = ByteRangeCalculator::new(16);
        assert!(calc.locate(b"%PDF-1.7\n%%EOF\n").is_err());
    }

    #[test]
    fn test_write_byte_range_keeps_length() {
        let calc = ByteRangeCalculator::new(16);
        let mut pdf = written_sig_dict(&calc);
        let len = pdf.len();
        let location = calc.locate(&pdf).unwrap();
        let byte_range = calc.calculate_byte_range(len, location.contents_offset);
        ByteRangeCalculator::write_byte_range(&mut pdf, &location, &byte_range).unwrap();
        assert_eq!(pdf.len(), len);

        let text = String::from_utf8_lossy(&pdf);
        let expected = format!(
            "[0 {} {} {}",
            byte_range[1], byte_range[2], byte_range[3]
        );
        assert!(text.contains(&expected));
        assert!(!text.contains("9999999999"));
        ByteRangeCalculator::validate_byte_range(&byte_range, len).unwrap();
    }

    #[test]
    fn test_extract_signed_bytes() {
        let pdf_data = b"AAABBBCCC";
        let signed = ByteRangeCalculator::extract_signed_bytes(pdf_data, &[0, 3, 6, 3]).unwrap();
        assert_eq!(signed, b"AAACCC");
        assert!(ByteRangeCalculator::extract_signed_bytes(pdf_data, &[0, 3, 6, 4]).is_err());
        assert!(ByteRangeCalculator::extract_signed_bytes(pdf_data, &[0, -3, 6, 3]).is_err());
    }

    #[test]
    fn test_validate_byte_range() {
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 50], 200).is_ok());
        assert!(ByteRangeCalculator::validate_byte_range(&[10, 100, 150, 50], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 100, 150, 100], 200).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(&[0, 160, 150, 50], 200).is_err());
    }

    #[test]
    fn test_insert_signature() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf_data = b"XX<00000000>YY".to_vec();
        calc.insert_signature(&mut pdf_data, 2, "ABCD").unwrap();
        assert_eq!(&pdf_data, b"XX<ABCD0000>YY");
    }

    #[test]
    fn test_insert_signature_too_large() {
        let calc = ByteRangeCalculator::with_placeholder_size(10);
        let mut pdf_data = b"XX<00000000>YY".to_vec();
        let result = calc.insert_signature(&mut pdf_data, 2, "AABBCCDDEE");
        assert!(matches!(result, Err(Error::ProcessingError(_))));
        assert_eq!(&pdf_data, b"XX<00000000>YY");
    }
}
