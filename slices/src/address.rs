use std::fmt;
use std::net::Ipv6Addr;

/// The address family of an EndpointSlice. A slice carries exactly one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressType {
    #[default]
    Ipv4,
    Ipv6,
}

impl AddressType {
    /// Classifies a single IP literal.
    ///
    /// Anything that does not parse as an IPv6 address, malformed input
    /// included, is treated as IPv4. So are IPv4-mapped literals such as
    /// `::ffff:10.0.0.1`, which an IPv6 slice may not carry.
    pub fn of(ip: &str) -> Self {
        match ip.parse::<Ipv6Addr>() {
            Ok(addr) if addr.to_ipv4_mapped().is_none() => AddressType::Ipv6,
            _ => AddressType::Ipv4,
        }
    }

    /// Picks the family for a whole set of addresses: IPv6 only when the set
    /// is non-empty and every literal in it is IPv6.
    pub fn of_all<'a, I>(ips: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ips = ips.into_iter().peekable();
        if ips.peek().is_some() && ips.all(|ip| Self::of(ip) == AddressType::Ipv6) {
            AddressType::Ipv6
        } else {
            AddressType::Ipv4
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Ipv4 => "IPv4",
            AddressType::Ipv6 => "IPv6",
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
