//! Amount Formatting Helpers
//!
//! Coins carry a decimal-places count (`Coin::decimals`); amounts move
//! through the coordinator as integer base units (satoshis, wei, atomic
//! units) and are only rendered to/from decimal strings at the edges.

/// Render `amount` base units as a decimal string with `decimals` places.
///
/// e.g. `format_amount(123_456_789, 8) == "1.23456789"`.
pub fn format_amount(amount: u128, decimals: u32) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let divisor = 10u128.pow(decimals);
    let whole = amount / divisor;
    let frac = amount % divisor;
    format!("{whole}.{frac:0width$}", width = decimals as usize)
}

/// Parse a decimal string into base units with `decimals` places.
///
/// Inverse of [`format_amount`] on valid round-trip inputs. Rejects strings
/// with more fractional digits than `decimals` allows rather than silently
/// truncating precision.
pub fn parse_amount(s: &str, decimals: u32) -> Option<u128> {
    let s = s.trim();
    let (whole_str, frac_str) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if frac_str.len() > decimals as usize {
        return None;
    }

    let whole: u128 = if whole_str.is_empty() {
        0
    } else {
        whole_str.parse().ok()?
    };

    let mut frac_padded = frac_str.to_string();
    frac_padded.extend(std::iter::repeat('0').take(decimals as usize - frac_str.len()));
    let frac: u128 = if frac_padded.is_empty() {
        0
    } else {
        frac_padded.parse().ok()?
    };

    let divisor = 10u128.pow(decimals);
    whole.checked_mul(divisor)?.checked_add(frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_parse_round_trip() {
        for decimals in [0u32, 2, 6, 8, 18] {
            for n in [0u128, 1, 42, 100_000_000, 999_999_999_999u128] {
                let formatted = format_amount(n, decimals);
                assert_eq!(
                    parse_amount(&formatted, decimals),
                    Some(n),
                    "round trip failed for {n} at {decimals} decimals ({formatted})"
                );
            }
        }
    }

    #[test]
    fn format_amount_pads_fraction() {
        assert_eq!(format_amount(1, 8), "0.00000001");
        assert_eq!(format_amount(100_000_000, 8), "1.00000000");
    }

    #[test]
    fn parse_amount_rejects_excess_precision() {
        assert_eq!(parse_amount("1.123", 2), None);
        assert_eq!(parse_amount("1.12", 2), Some(112));
    }

    #[test]
    fn parse_amount_accepts_whole_numbers() {
        assert_eq!(parse_amount("42", 8), Some(42_00000000));
    }
}
