//! RFC 2579 DISPLAY-HINT formatting for octet strings.
//!
//! A hint is a sequence of octet-format specs applied left to right:
//!
//! ```text
//! spec         := '*'? octet-length format-char sep? term?
//! octet-length := [0-9]+
//! format-char  := 'd' | 'x' | 'o' | 'a' | 't'
//! ```
//!
//! With the `*` prefix the next input byte is consumed as the repeat count
//! for the spec. A separator byte is emitted after each application, a
//! terminator byte after a repeat group; both are suppressed at end of
//! input. When the spec stream runs out before the input does, the last
//! spec repeats.
//!
//! The separator on the final repetition of a starred group is suppressed
//! only when the terminator is actually about to be emitted (input
//! remains); with input exhausted both are suppressed. This matches the
//! reference formatter rather than a strict reading of the RFC.

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Apply a DISPLAY-HINT to raw bytes in a single pass.
///
/// Returns `None` on an empty hint, empty data, or any grammar violation;
/// the caller falls back to the type-default rendering. The hot callers
/// are short outputs (MACs, addresses, date stamps), so the output buffer
/// is sized once from a conservative estimate.
pub fn apply_display_hint(hint: &str, data: &[u8]) -> Option<String> {
    if hint.is_empty() || data.is_empty() {
        return None;
    }

    let hint = hint.as_bytes();
    let mut out = String::with_capacity(estimate_output_len(hint, data.len()));

    let mut hint_pos = 0usize;
    let mut data_pos = 0usize;

    // Start of the last spec, for implicit repetition.
    let mut last_spec_start = 0usize;
    // Whether the last spec consumes input, to reject degenerate loops.
    let mut last_spec_consumes = false;

    while data_pos < data.len() {
        let mut spec_start = hint_pos;

        if hint_pos >= hint.len() {
            if !last_spec_consumes {
                return None;
            }
            hint_pos = last_spec_start;
            spec_start = last_spec_start;
        }

        // (1) Optional '*' repeat indicator.
        let star = hint[hint_pos] == b'*';
        if star {
            hint_pos += 1;
        }

        // (2) Octet length, one or more decimal digits (required).
        if hint_pos >= hint.len() || !hint[hint_pos].is_ascii_digit() {
            return None;
        }
        let mut take: u64 = 0;
        while hint_pos < hint.len() && hint[hint_pos].is_ascii_digit() {
            take = take * 10 + u64::from(hint[hint_pos] - b'0');
            if take > i32::MAX as u64 {
                return None;
            }
            hint_pos += 1;
        }
        let take = take as usize;

        // (3) Format character (required).
        if hint_pos >= hint.len() {
            return None;
        }
        let fmt = hint[hint_pos];
        if !matches!(fmt, b'd' | b'x' | b'o' | b'a' | b't') {
            return None;
        }
        hint_pos += 1;

        // (4) Optional separator.
        let mut sep = None;
        if hint_pos < hint.len() && !hint[hint_pos].is_ascii_digit() && hint[hint_pos] != b'*' {
            sep = Some(hint[hint_pos]);
            hint_pos += 1;
        }

        // (5) Optional terminator, only valid after a '*' spec.
        let mut term = None;
        if star && hint_pos < hint.len() && !hint[hint_pos].is_ascii_digit() && hint[hint_pos] != b'*'
        {
            term = Some(hint[hint_pos]);
            hint_pos += 1;
        }

        last_spec_start = spec_start;
        last_spec_consumes = take > 0 || star;

        // The repeat count byte is consumed before the formatted chunks.
        let mut repeat = 1usize;
        if star && data_pos < data.len() {
            repeat = usize::from(data[data_pos]);
            data_pos += 1;
        }

        let mut r = 0;
        while r < repeat && data_pos < data.len() {
            let end = (data_pos + take).min(data.len());
            let chunk = &data[data_pos..end];

            match fmt {
                b'd' => {
                    let mut val: u64 = 0;
                    for &b in chunk {
                        val = (val << 8) | u64::from(b);
                    }
                    push_u64(&mut out, val, 10);
                }
                b'o' => {
                    let mut val: u64 = 0;
                    for &b in chunk {
                        val = (val << 8) | u64::from(b);
                    }
                    push_u64(&mut out, val, 8);
                }
                b'x' => {
                    for &b in chunk {
                        out.push(HEX_DIGITS[usize::from(b >> 4)] as char);
                        out.push(HEX_DIGITS[usize::from(b & 0x0F)] as char);
                    }
                }
                // 'a' and 't' copy the bytes as text, no validation.
                _ => out.push_str(&String::from_utf8_lossy(chunk)),
            }
            data_pos = end;

            // Separator, unless at end of input or displaced by the
            // terminator on the final repetition.
            if let Some(s) = sep
                && data_pos < data.len()
                && (term.is_none() || r != repeat - 1)
            {
                out.push(s as char);
            }

            r += 1;
        }

        if let Some(t) = term
            && data_pos < data.len()
        {
            out.push(t as char);
        }
    }

    Some(out)
}

/// Conservative output size guess keyed on the trailing format character:
/// hex doubles the input, decimal can triple it, text copies it.
fn estimate_output_len(hint: &[u8], data_len: usize) -> usize {
    match hint.last() {
        Some(b'a') | Some(b't') => data_len + hint.len(),
        Some(b'x') => data_len * 2 + hint.len(),
        _ => data_len * 3 + hint.len(),
    }
}

fn push_u64(out: &mut String, mut val: u64, base: u64) {
    // Enough for 2^64 in octal.
    let mut buf = [0u8; 22];
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = b'0' + (val % base) as u8;
        val /= base;
        if val == 0 {
            break;
        }
    }
    for &b in &buf[i..] {
        out.push(b as char);
    }
}
