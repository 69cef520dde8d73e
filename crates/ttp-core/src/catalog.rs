//! Built-in OpenFlow 1.3 OXM match fields.
//!
//! Every model starts with these fields declared, so tables can name
//! `eth_type` or `ipv4_src` without a `fields` section. Widths and
//! prerequisites follow the OpenFlow 1.3 basic match field table.

use crate::model::{Field, FieldOrigin, Link, MatchType, MatchTypeSet, Prerequisite, ValueExpr};

struct StandardField {
    name: &'static str,
    width: u32,
    maskable: bool,
    prerequisite: Option<&'static str>,
    prerequisite_values: &'static [u128],
}

const IPV4: u128 = 0x0800;
const ARP: u128 = 0x0806;
const IPV6: u128 = 0x86dd;
const MPLS_UNICAST: u128 = 0x8847;
const MPLS_MULTICAST: u128 = 0x8848;
const PBB: u128 = 0x88e7;

const fn field(
    name: &'static str,
    width: u32,
    maskable: bool,
    prerequisite: Option<&'static str>,
    prerequisite_values: &'static [u128],
) -> StandardField {
    StandardField {
        name,
        width,
        maskable,
        prerequisite,
        prerequisite_values,
    }
}

const STANDARD: &[StandardField] = &[
    field("in_port", 32, false, None, &[]),
    field("in_phy_port", 32, false, Some("in_port"), &[]),
    field("metadata", 64, true, None, &[]),
    field("eth_dst", 48, true, None, &[]),
    field("eth_src", 48, true, None, &[]),
    field("eth_type", 16, false, None, &[]),
    field("vlan_vid", 13, true, None, &[]),
    field("vlan_pcp", 3, false, Some("vlan_vid"), &[]),
    field("ip_dscp", 6, false, Some("eth_type"), &[IPV4, IPV6]),
    field("ip_ecn", 2, false, Some("eth_type"), &[IPV4, IPV6]),
    field("ip_proto", 8, false, Some("eth_type"), &[IPV4, IPV6]),
    field("ipv4_src", 32, true, Some("eth_type"), &[IPV4]),
    field("ipv4_dst", 32, true, Some("eth_type"), &[IPV4]),
    field("tcp_src", 16, false, Some("ip_proto"), &[6]),
    field("tcp_dst", 16, false, Some("ip_proto"), &[6]),
    field("udp_src", 16, false, Some("ip_proto"), &[17]),
    field("udp_dst", 16, false, Some("ip_proto"), &[17]),
    field("sctp_src", 16, false, Some("ip_proto"), &[132]),
    field("sctp_dst", 16, false, Some("ip_proto"), &[132]),
    field("icmpv4_type", 8, false, Some("ip_proto"), &[1]),
    field("icmpv4_code", 8, false, Some("ip_proto"), &[1]),
    field("arp_op", 16, false, Some("eth_type"), &[ARP]),
    field("arp_spa", 32, true, Some("eth_type"), &[ARP]),
    field("arp_tpa", 32, true, Some("eth_type"), &[ARP]),
    field("arp_sha", 48, true, Some("eth_type"), &[ARP]),
    field("arp_tha", 48, true, Some("eth_type"), &[ARP]),
    field("ipv6_src", 128, true, Some("eth_type"), &[IPV6]),
    field("ipv6_dst", 128, true, Some("eth_type"), &[IPV6]),
    field("ipv6_flabel", 20, true, Some("eth_type"), &[IPV6]),
    field("icmpv6_type", 8, false, Some("ip_proto"), &[58]),
    field("icmpv6_code", 8, false, Some("ip_proto"), &[58]),
    field("ipv6_nd_target", 128, false, Some("icmpv6_type"), &[135, 136]),
    field("ipv6_nd_sll", 48, false, Some("icmpv6_type"), &[135]),
    field("ipv6_nd_tll", 48, false, Some("icmpv6_type"), &[136]),
    field("mpls_label", 20, false, Some("eth_type"), &[MPLS_UNICAST, MPLS_MULTICAST]),
    field("mpls_tc", 3, false, Some("eth_type"), &[MPLS_UNICAST, MPLS_MULTICAST]),
    field("mpls_bos", 1, false, Some("eth_type"), &[MPLS_UNICAST, MPLS_MULTICAST]),
    field("pbb_isid", 24, true, Some("eth_type"), &[PBB]),
    field("tunnel_id", 64, true, None, &[]),
    field("ipv6_exthdr", 9, true, Some("eth_type"), &[IPV6]),
];

/// Normalize a field spelling: lower case, `OXM_OF_` prefix removed.
pub fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    match lower.strip_prefix("oxm_of_") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

/// Whether `name` is a built-in field.
pub fn is_standard(name: &str) -> bool {
    let canonical = canonical_name(name);
    STANDARD.iter().any(|f| f.name == canonical)
}

/// Names of all built-in fields, in catalogue order.
pub fn standard_names() -> impl Iterator<Item = &'static str> {
    STANDARD.iter().map(|f| f.name)
}

/// Build the built-in field declarations. Prerequisite links are left
/// pending for the resolver.
pub fn standard_fields() -> Vec<Field> {
    STANDARD
        .iter()
        .map(|f| {
            let match_types: MatchTypeSet = if f.maskable {
                MatchType::ALL.into_iter().collect()
            } else {
                [MatchType::Exact, MatchType::Range, MatchType::Wildcard]
                    .into_iter()
                    .collect()
            };
            Field {
                name: f.name.to_string(),
                origin: FieldOrigin::Standard,
                width: ValueExpr::literal(u128::from(f.width)),
                match_types,
                prerequisite: f.prerequisite.map(|name| Prerequisite {
                    field: Link::new(name),
                    values: f
                        .prerequisite_values
                        .iter()
                        .map(|v| ValueExpr::literal(*v))
                        .collect(),
                }),
                domain: None,
                doc: None,
            }
        })
        .collect()
}
