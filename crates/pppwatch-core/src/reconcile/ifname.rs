// ── Tunnel interface naming ──
//
// RouterOS creates one dynamic interface per PPP session and names it
// after the secret: `<pppoe-alice>` on most firmware, `pppoe-alice` on
// some, with the same shape for the other tunnel services.

const TUNNEL_PREFIXES: [&str; 5] = ["pppoe", "pptp", "l2tp", "sstp", "ovpn"];

/// Secret name carried by a PPP tunnel interface, or `None` for any other
/// interface.
pub fn secret_name(interface: &str) -> Option<&str> {
    let inner = interface.strip_prefix('<').unwrap_or(interface);
    let inner = inner.strip_suffix('>').unwrap_or(inner);

    let (prefix, name) = inner.split_once('-')?;
    if name.is_empty() || !TUNNEL_PREFIXES.contains(&prefix) {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::secret_name;

    #[test]
    fn bracketed_pppoe() {
        assert_eq!(secret_name("<pppoe-alice>"), Some("alice"));
    }

    #[test]
    fn bare_pppoe() {
        assert_eq!(secret_name("pppoe-alice"), Some("alice"));
    }

    #[test]
    fn every_tunnel_service() {
        for (iface, expected) in [
            ("<pptp-bob>", "bob"),
            ("pptp-bob", "bob"),
            ("<l2tp-carol>", "carol"),
            ("l2tp-carol", "carol"),
            ("<sstp-dave>", "dave"),
            ("sstp-dave", "dave"),
            ("<ovpn-erin>", "erin"),
            ("ovpn-erin", "erin"),
        ] {
            assert_eq!(secret_name(iface), Some(expected), "{iface}");
        }
    }

    #[test]
    fn names_with_dashes_and_dots_survive() {
        assert_eq!(secret_name("<pppoe-rt02-blok-c.7>"), Some("rt02-blok-c.7"));
        assert_eq!(secret_name("pppoe-a-"), Some("a-"));
    }

    #[test]
    fn lone_bracket_is_tolerated() {
        assert_eq!(secret_name("<pppoe-alice"), Some("alice"));
        assert_eq!(secret_name("pppoe-alice>"), Some("alice"));
    }

    #[test]
    fn other_interfaces_do_not_match() {
        for iface in [
            "ether1",
            "bridge-lan",
            "vlan-100",
            "<pppoe->",
            "pppoe-",
            "pppoe",
            "<>",
            "",
            "PPPOE-alice",
            "pppoe_alice",
            "wg-peer",
        ] {
            assert_eq!(secret_name(iface), None, "{iface:?}");
        }
    }
}
