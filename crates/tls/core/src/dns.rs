use std::{error::Error as StdError, fmt};

/// A validated DNS name, stored in its lowercase ASCII form.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DnsName(String);

impl DnsName {
    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow the webpki view of this name.
    pub fn as_webpki(&self) -> webpki::DnsNameRef {
        webpki::DnsNameRef::try_from_ascii_str(&self.0).expect("validated at construction")
    }
}

/// Encodes ways a client can know the expected name of the server.
///
/// This currently covers knowing the DNS name of the server, but
/// will be extended in the future to knowing the IP address of the
/// server.  For this reason this enum is `non_exhaustive`.
///
/// # Making one
///
/// If you have a DNS name as a `&str`, this type implements `TryFrom<&str>`,
/// so you can do:
///
/// ```
/// # use std::convert::{TryInto, TryFrom};
/// # use tls_core::dns::ServerName;
/// ServerName::try_from("example.com").expect("invalid DNS name");
///
/// // or, alternatively...
///
/// let x = "example.com".try_into().expect("invalid DNS name");
/// # let _: ServerName = x;
/// ```
#[non_exhaustive]
#[derive(Debug, PartialEq, Clone)]
pub enum ServerName {
    /// The server is identified by a DNS name.  The name
    /// is sent in the TLS Server Name Indication (SNI)
    /// extension.
    DnsName(DnsName),
}

impl ServerName {
    /// Return the name that should go in the SNI extension.
    /// If [`None`] is returned, the SNI extension is not included
    /// in the handshake.
    pub fn for_sni(&self) -> Option<&DnsName> {
        match self {
            Self::DnsName(dns_name) => Some(dns_name),
        }
    }
}

/// Attempt to make a ServerName from a string by parsing
/// it as a DNS name.
impl TryFrom<&str> for ServerName {
    type Error = InvalidDnsNameError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match webpki::DnsNameRef::try_from_ascii_str(s) {
            Ok(_) => Ok(Self::DnsName(DnsName(s.to_ascii_lowercase()))),
            Err(webpki::InvalidDnsNameError) => Err(InvalidDnsNameError),
        }
    }
}

/// The provided input could not be parsed because
/// it is not a syntactically-valid DNS Name.
#[derive(Debug)]
pub struct InvalidDnsNameError;

impl fmt::Display for InvalidDnsNameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid dns name")
    }
}

impl StdError for InvalidDnsNameError {}

fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

/// Numeric and IPv6-literal names never match a wildcard.
fn is_ip_form(name: &[u8]) -> bool {
    if name.contains(&b':') {
        return true;
    }
    !name.is_empty() && name.iter().all(|b| b.is_ascii_digit() || *b == b'.')
}

/// Compare a certificate name pattern against a hostname.
///
/// Comparison is ASCII case-insensitive.  A `*` is honoured only as
/// the complete leftmost label, must be followed by at least two more
/// labels, and matches one or more leading labels of the hostname;
/// it never matches an all-numeric or IP-literal name.  Strings with
/// embedded NUL bytes are compared as raw bytes, which makes a
/// truncated comparison impossible.
pub fn hostname_match(pattern: &[u8], hostname: &[u8]) -> bool {
    if pattern.first() != Some(&b'*') {
        return eq_ignore_ascii_case(pattern, hostname);
    }

    // Wildcard: require "*." and two dots after the asterisk, so
    // "*", "*." and "*.com" never match anything.
    if pattern.get(1) != Some(&b'.') {
        return false;
    }
    if pattern.iter().filter(|b| **b == b'.').count() < 2 {
        return false;
    }
    if is_ip_form(hostname) {
        return false;
    }

    let suffix = &pattern[1..];
    if hostname.len() <= suffix.len() {
        return false;
    }
    let tail = &hostname[hostname.len() - suffix.len()..];
    eq_ignore_ascii_case(suffix, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_is_case_insensitive() {
        assert!(hostname_match(b"Example.COM", b"example.com"));
        assert!(hostname_match(b"example.com", b"EXAMPLE.com"));
        assert!(!hostname_match(b"example.com", b"example.org"));
        assert!(!hostname_match(b"example.com", b"wexample.com"));
    }

    #[test]
    fn wildcard_matches_leading_labels() {
        assert!(hostname_match(b"*.example.com", b"www.example.com"));
        assert!(hostname_match(b"*.example.com", b"a.b.example.com"));
        assert!(!hostname_match(b"*.example.com", b"example.com"));
        assert!(!hostname_match(b"*", b"example.com"));
        assert!(!hostname_match(b"*.com", b"example.com"));
        assert!(!hostname_match(b"*.", b"example.com"));
    }

    #[test]
    fn wildcard_never_matches_numeric_names() {
        assert!(!hostname_match(b"*.168.1.1", b"192.168.1.1"));
        assert!(!hostname_match(b"*.example.com", b"fe80::1"));
    }

    #[test]
    fn embedded_nul_is_compared_raw() {
        assert!(!hostname_match(b"example.com\0evil", b"example.com"));
        assert!(hostname_match(b"a\0b.example.com", b"a\0b.example.com"));
    }

    #[test]
    fn server_name_parsing() {
        assert!(ServerName::try_from("example.com").is_ok());
        assert!(ServerName::try_from("").is_err());
        let name = ServerName::try_from("Example.COM").unwrap();
        let ServerName::DnsName(dns) = name;
        assert_eq!(dns.as_str(), "example.com");
    }
}
