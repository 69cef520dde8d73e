//! Literal value forms accepted in patterns.
//!
//! Besides plain integers (`2048`, `0x0800`, `0b1`, `0o17`), values may be
//! written as IPv4 or IPv6 addresses, MAC addresses, or one of the
//! OpenFlow reserved names such as `CONTROLLER` or `OFPVID_PRESENT`.
//! Every form normalizes to a `u128`.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::expr::{Expr, ExprError};

/// OpenFlow reserved port numbers and VLAN markers, by name.
const NAMED_CONSTANTS: &[(&str, u128)] = &[
    ("IN_PORT", 0xffff_fff8),
    ("TABLE", 0xffff_fff9),
    ("NORMAL", 0xffff_fffa),
    ("FLOOD", 0xffff_fffb),
    ("ALL", 0xffff_fffc),
    ("CONTROLLER", 0xffff_fffd),
    ("LOCAL", 0xffff_fffe),
    ("ANY", 0xffff_ffff),
    ("OFPVID_PRESENT", 0x1000),
    ("OFPVID_NONE", 0),
];

/// Look up a reserved name. An `OFPP_` prefix is accepted for ports.
pub fn named_constant(name: &str) -> Option<u128> {
    let upper = name.to_ascii_uppercase();
    let bare = upper.strip_prefix("OFPP_").unwrap_or(&upper);
    NAMED_CONSTANTS
        .iter()
        .find(|(n, _)| *n == bare || *n == upper)
        .map(|(_, v)| *v)
}

/// Parse an integer in decimal, `0x`, `0o`, or `0b` notation.
/// Underscores between digits are ignored.
pub fn parse_integer(text: &str) -> Option<u128> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.as_str(), 10)
    };
    if digits.is_empty() {
        return None;
    }
    u128::from_str_radix(digits, radix).ok()
}

/// Parse a MAC address written with `:` or `-` separators.
pub fn parse_mac(text: &str) -> Option<u128> {
    let sep = if text.contains(':') { ':' } else { '-' };
    let parts: Vec<&str> = text.split(sep).collect();
    if parts.len() != 6 {
        return None;
    }
    let mut value: u128 = 0;
    for part in parts {
        if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        value = (value << 8) | u128::from(u8::from_str_radix(part, 16).ok()?);
    }
    Some(value)
}

/// Parse an address literal: IPv4, IPv6, then MAC.
pub fn parse_address(text: &str) -> Option<u128> {
    if let Ok(v4) = text.parse::<Ipv4Addr>() {
        return Some(u128::from(u32::from(v4)));
    }
    if text.contains(':') {
        if let Ok(v6) = text.parse::<Ipv6Addr>() {
            // Six colon groups without `::` read as a MAC address.
            if text.contains("::") || text.split(':').count() == 8 {
                return Some(u128::from(v6));
            }
        }
    }
    parse_mac(text)
}

/// Parse a value written as text: an address, a reserved name, or an
/// expression.
pub fn parse_value_text(text: &str) -> Result<Expr, ExprError> {
    let trimmed = text.trim();
    if let Some(v) = parse_address(trimmed) {
        return Ok(Expr::Lit(v));
    }
    if let Some(v) = named_constant(trimmed) {
        return Ok(Expr::Lit(v));
    }
    Expr::parse(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_in_all_radixes() {
        assert_eq!(parse_integer("2048"), Some(2048));
        assert_eq!(parse_integer("0x0800"), Some(0x800));
        assert_eq!(parse_integer("0X86DD"), Some(0x86dd));
        assert_eq!(parse_integer("0b101"), Some(5));
        assert_eq!(parse_integer("0o17"), Some(15));
        assert_eq!(parse_integer("1_000"), Some(1000));
        assert_eq!(parse_integer("0x"), None);
        assert_eq!(parse_integer("12ab"), None);
    }

    #[test]
    fn ipv4_and_ipv6() {
        assert_eq!(parse_address("10.0.0.1"), Some(0x0a00_0001));
        assert_eq!(parse_address("::1"), Some(1));
        assert_eq!(
            parse_address("fe80::1"),
            Some(0xfe80_0000_0000_0000_0000_0000_0000_0001)
        );
    }

    #[test]
    fn mac_forms() {
        assert_eq!(parse_address("00:11:22:33:44:55"), Some(0x0011_2233_4455));
        assert_eq!(parse_address("01-80-c2-00-00-0e"), Some(0x0180_c200_000e));
        assert_eq!(parse_mac("00:11:22:33:44"), None);
    }

    #[test]
    fn reserved_names() {
        assert_eq!(named_constant("CONTROLLER"), Some(0xffff_fffd));
        assert_eq!(named_constant("OFPP_LOCAL"), Some(0xffff_fffe));
        assert_eq!(named_constant("ofpvid_present"), Some(0x1000));
        assert_eq!(named_constant("BOGUS"), None);
    }

    #[test]
    fn value_text_falls_back_to_expression() {
        assert_eq!(parse_value_text("IN_PORT").unwrap(), Expr::Lit(0xffff_fff8));
        assert_eq!(parse_value_text(" 0x0800 ").unwrap(), Expr::Lit(0x800));
        assert!(matches!(
            parse_value_text("<vid> | OFPVID_PRESENT").unwrap(),
            Expr::Binary(..)
        ));
    }
}
