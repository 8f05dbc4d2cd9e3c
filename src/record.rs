//! Typed DNS resource records and their presentation format.
//!
//! Records are immutable values. Owner names are normalized (lowercase,
//! single trailing dot) at construction so that equality and zone lookups are
//! case- and trailing-dot-insensitive.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use hickory_proto::rr::RecordType;

use crate::error::DnsError;

/// Longest character-string a TXT record can carry on the wire.
pub const MAX_CHARACTER_STRING: usize = 255;

/// Record types the fixture model can hold.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    /// IPv4 address.
    A,
    /// IPv6 address.
    AAAA,
    /// Service locator.
    SRV,
    /// Text.
    TXT,
    /// Canonical name alias.
    CNAME,
    /// Mail exchange.
    MX,
    /// Name server.
    NS,
    /// Start of authority.
    SOA,
}

impl RecordKind {
    /// All supported kinds, in mnemonic order.
    pub const ALL: [RecordKind; 8] = [
        RecordKind::A,
        RecordKind::AAAA,
        RecordKind::SRV,
        RecordKind::TXT,
        RecordKind::CNAME,
        RecordKind::MX,
        RecordKind::NS,
        RecordKind::SOA,
    ];

    /// Presentation mnemonic.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::AAAA => "AAAA",
            RecordKind::SRV => "SRV",
            RecordKind::TXT => "TXT",
            RecordKind::CNAME => "CNAME",
            RecordKind::MX => "MX",
            RecordKind::NS => "NS",
            RecordKind::SOA => "SOA",
        }
    }

    /// True for A and AAAA.
    pub fn is_address(&self) -> bool {
        matches!(self, RecordKind::A | RecordKind::AAAA)
    }

    /// Address record kind for an IP literal's family.
    pub fn for_address(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordKind::A,
            IpAddr::V6(_) => RecordKind::AAAA,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DnsError::invalid("type", format!("unsupported record type `{s}`")))
    }
}

impl From<RecordKind> for RecordType {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::A => RecordType::A,
            RecordKind::AAAA => RecordType::AAAA,
            RecordKind::SRV => RecordType::SRV,
            RecordKind::TXT => RecordType::TXT,
            RecordKind::CNAME => RecordType::CNAME,
            RecordKind::MX => RecordType::MX,
            RecordKind::NS => RecordType::NS,
            RecordKind::SOA => RecordType::SOA,
        }
    }
}

impl TryFrom<RecordType> for RecordKind {
    type Error = DnsError;

    fn try_from(rtype: RecordType) -> Result<Self, Self::Error> {
        match rtype {
            RecordType::A => Ok(RecordKind::A),
            RecordType::AAAA => Ok(RecordKind::AAAA),
            RecordType::SRV => Ok(RecordKind::SRV),
            RecordType::TXT => Ok(RecordKind::TXT),
            RecordType::CNAME => Ok(RecordKind::CNAME),
            RecordType::MX => Ok(RecordKind::MX),
            RecordType::NS => Ok(RecordKind::NS),
            RecordType::SOA => Ok(RecordKind::SOA),
            other => Err(DnsError::invalid(
                "type",
                format!("unsupported record type `{other}`"),
            )),
        }
    }
}

/// Normalize a DNS name for comparison: lowercase with exactly one trailing dot.
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    format!("{}.", trimmed.to_ascii_lowercase())
}

pub(crate) fn validate_name(field: &'static str, name: &str) -> Result<String, DnsError> {
    if name.trim().is_empty() {
        return Err(DnsError::invalid(field, "name is empty"));
    }
    if name.trim().chars().any(char::is_whitespace) {
        return Err(DnsError::invalid(
            field,
            format!("`{name}` contains whitespace"),
        ));
    }
    let normalized = normalize_name(name);
    if normalized != "." && normalized[..normalized.len() - 1].split('.').any(str::is_empty) {
        return Err(DnsError::invalid(field, format!("`{name}` has an empty label")));
    }
    Ok(normalized)
}

/// Type-specific record data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    /// A or AAAA address.
    Address(IpAddr),
    /// SRV target tuple.
    Srv {
        /// Lower is preferred.
        priority: u16,
        /// Relative weight among equal priorities.
        weight: u16,
        /// Service port on the target.
        port: u16,
        /// Normalized target host name.
        target: String,
    },
    /// TXT payload, the concatenation of all character-strings.
    Text(String),
    /// CNAME or NS target.
    Name(String),
    /// MX exchange.
    Mx {
        /// Lower is preferred.
        preference: u16,
        /// Normalized exchange host name.
        exchange: String,
    },
    /// SOA fields.
    Soa {
        /// Primary name server.
        mname: String,
        /// Responsible mailbox in DNS form.
        rname: String,
        /// Zone serial.
        serial: u32,
        /// Refresh interval in seconds.
        refresh: u32,
        /// Retry interval in seconds.
        retry: u32,
        /// Expire time in seconds.
        expire: u32,
        /// Negative caching TTL in seconds.
        minimum: u32,
    },
}

impl Payload {
    /// Whether this payload may be carried by a record of `kind`.
    pub fn fits(&self, kind: RecordKind) -> bool {
        match (self, kind) {
            (Payload::Address(IpAddr::V4(_)), RecordKind::A) => true,
            (Payload::Address(IpAddr::V6(_)), RecordKind::AAAA) => true,
            (Payload::Srv { .. }, RecordKind::SRV) => true,
            (Payload::Text(_), RecordKind::TXT) => true,
            (Payload::Name(_), RecordKind::CNAME | RecordKind::NS) => true,
            (Payload::Mx { .. }, RecordKind::MX) => true,
            (Payload::Soa { .. }, RecordKind::SOA) => true,
            _ => false,
        }
    }

    /// Parse presentation-format rdata for a record of `kind`.
    ///
    /// TXT rdata may be a sequence of quoted character-strings (as printed by
    /// `dig`) or bare words; the strings are concatenated.
    pub fn parse(kind: RecordKind, rdata: &str) -> Result<Self, DnsError> {
        let tokens = tokenize(rdata).map_err(|reason| DnsError::invalid("rdata", reason))?;
        Self::from_tokens(kind, &tokens)
    }

    pub(crate) fn from_tokens(kind: RecordKind, tokens: &[Token]) -> Result<Self, DnsError> {
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        let expect = |n: usize| -> Result<(), DnsError> {
            if words.len() == n {
                Ok(())
            } else {
                Err(DnsError::invalid(
                    "rdata",
                    format!("{kind} rdata needs {n} fields, got {}", words.len()),
                ))
            }
        };

        match kind {
            RecordKind::A => {
                expect(1)?;
                parse_ipv4(words[0]).map(|ip| Payload::Address(IpAddr::V4(ip)))
            }
            RecordKind::AAAA => {
                expect(1)?;
                parse_ipv6(words[0]).map(|ip| Payload::Address(IpAddr::V6(ip)))
            }
            RecordKind::SRV => {
                expect(4)?;
                Ok(Payload::Srv {
                    priority: parse_u16("priority", words[0])?,
                    weight: parse_u16("weight", words[1])?,
                    port: parse_port(words[2])?,
                    target: validate_name("target", words[3])?,
                })
            }
            RecordKind::TXT => {
                if words.is_empty() {
                    return Err(DnsError::invalid("rdata", "TXT rdata is empty"));
                }
                // Quoted character-strings concatenate; bare words keep their separating space.
                let mut text = String::new();
                for (index, token) in tokens.iter().enumerate() {
                    if index > 0 && !token.quoted && !tokens[index - 1].quoted {
                        text.push(' ');
                    }
                    text.push_str(&token.text);
                }
                Ok(Payload::Text(text))
            }
            RecordKind::CNAME | RecordKind::NS => {
                expect(1)?;
                Ok(Payload::Name(validate_name("target", words[0])?))
            }
            RecordKind::MX => {
                expect(2)?;
                Ok(Payload::Mx {
                    preference: parse_u16("preference", words[0])?,
                    exchange: validate_name("exchange", words[1])?,
                })
            }
            RecordKind::SOA => {
                expect(7)?;
                Ok(Payload::Soa {
                    mname: validate_name("mname", words[0])?,
                    rname: validate_name("rname", words[1])?,
                    serial: parse_u32("serial", words[2])?,
                    refresh: parse_u32("refresh", words[3])?,
                    retry: parse_u32("retry", words[4])?,
                    expire: parse_u32("expire", words[5])?,
                    minimum: parse_u32("minimum", words[6])?,
                })
            }
        }
    }

    /// Presentation-format rdata.
    pub fn rdata(&self) -> String {
        match self {
            Payload::Address(ip) => ip.to_string(),
            Payload::Srv {
                priority,
                weight,
                port,
                target,
            } => format!("{priority} {weight} {port} {target}"),
            Payload::Text(text) => text_chunks(text)
                .iter()
                .map(|chunk| quote(chunk))
                .collect::<Vec<_>>()
                .join(" "),
            Payload::Name(target) => target.clone(),
            Payload::Mx {
                preference,
                exchange,
            } => format!("{preference} {exchange}"),
            Payload::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => format!("{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"),
        }
    }
}

/// Split a TXT payload into wire-sized character-strings.
///
/// Chunks never split a UTF-8 sequence. An empty payload yields one empty
/// string.
pub fn text_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if current.len() + c.len_utf8() > MAX_CHARACTER_STRING {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn quote(chunk: &str) -> String {
    let mut out = String::with_capacity(chunk.len() + 2);
    out.push('"');
    for c in chunk.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn parse_ipv4(s: &str) -> Result<Ipv4Addr, DnsError> {
    s.parse()
        .map_err(|_| DnsError::invalid("address", format!("`{s}` is not an IPv4 address")))
}

fn parse_ipv6(s: &str) -> Result<Ipv6Addr, DnsError> {
    s.parse()
        .map_err(|_| DnsError::invalid("address", format!("`{s}` is not an IPv6 address")))
}

fn parse_u16(field: &'static str, s: &str) -> Result<u16, DnsError> {
    s.parse()
        .map_err(|_| DnsError::invalid(field, format!("`{s}` is not in 0-65535")))
}

fn parse_u32(field: &'static str, s: &str) -> Result<u32, DnsError> {
    s.parse()
        .map_err(|_| DnsError::invalid(field, format!("`{s}` is not an unsigned 32-bit integer")))
}

fn parse_port(s: &str) -> Result<u16, DnsError> {
    parse_u16("port", s)
}

/// A whitespace-separated token of a presentation line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) text: String,
    pub(crate) quoted: bool,
}

/// Split a presentation line into tokens, honoring `"..."` strings and the
/// `\X` / `\DDD` escapes used inside them.
pub(crate) fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut bytes = Vec::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => {
                        let digits: String = chars
                            .clone()
                            .take(3)
                            .take_while(char::is_ascii_digit)
                            .collect();
                        if digits.len() == 3 {
                            let value: u16 = digits.parse().map_err(|_| "bad escape")?;
                            let byte = u8::try_from(value)
                                .map_err(|_| format!("escape \\{digits} out of range"))?;
                            bytes.push(byte);
                            for _ in 0..3 {
                                chars.next();
                            }
                        } else {
                            let escaped = chars.next().ok_or("dangling escape")?;
                            let mut buf = [0u8; 4];
                            bytes.extend_from_slice(escaped.encode_utf8(&mut buf).as_bytes());
                        }
                    }
                    other => {
                        let mut buf = [0u8; 4];
                        bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
                    }
                }
            }
            if !closed {
                return Err("unterminated quoted string".to_string());
            }
            tokens.push(Token {
                text: String::from_utf8_lossy(&bytes).into_owned(),
                quoted: true,
            });
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(Token {
            text: word,
            quoted: false,
        });
    }

    Ok(tokens)
}

/// An immutable DNS resource record of class IN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRecord {
    name: String,
    kind: RecordKind,
    ttl: u32,
    data: Payload,
}

impl ResourceRecord {
    /// Build a record from parts, checking that the payload fits the kind.
    pub fn new(name: &str, kind: RecordKind, ttl: u32, data: Payload) -> Result<Self, DnsError> {
        let name = validate_name("name", name)?;
        if !data.fits(kind) {
            let field = if kind.is_address() { "address" } else { "rdata" };
            return Err(DnsError::invalid(
                field,
                format!("`{}` is not valid {kind} data", data.rdata()),
            ));
        }
        Ok(Self {
            name,
            kind,
            ttl,
            data,
        })
    }

    /// A or AAAA record. The address literal must match the declared family.
    pub fn new_address(kind: RecordKind, name: &str, ttl: u32, ip: &str) -> Result<Self, DnsError> {
        let address = match kind {
            RecordKind::A => IpAddr::V4(parse_ipv4(ip.trim())?),
            RecordKind::AAAA => IpAddr::V6(parse_ipv6(ip.trim())?),
            other => {
                return Err(DnsError::invalid(
                    "type",
                    format!("{other} is not an address record type"),
                ))
            }
        };
        Self::new(name, kind, ttl, Payload::Address(address))
    }

    /// SRV record pointing at `target:port`.
    pub fn new_srv(
        name: &str,
        ttl: u32,
        priority: u16,
        weight: u16,
        port: u16,
        target: &str,
    ) -> Result<Self, DnsError> {
        let target = validate_name("target", target)?;
        Self::new(
            name,
            RecordKind::SRV,
            ttl,
            Payload::Srv {
                priority,
                weight,
                port,
                target,
            },
        )
    }

    /// TXT record carrying `text` verbatim.
    pub fn new_txt(name: &str, ttl: u32, text: impl Into<String>) -> Result<Self, DnsError> {
        Self::new(name, RecordKind::TXT, ttl, Payload::Text(text.into()))
    }

    /// CNAME or NS record pointing at `target`.
    pub fn new_name(kind: RecordKind, name: &str, ttl: u32, target: &str) -> Result<Self, DnsError> {
        let target = validate_name("target", target)?;
        Self::new(name, kind, ttl, Payload::Name(target))
    }

    /// MX record.
    pub fn new_mx(name: &str, ttl: u32, preference: u16, exchange: &str) -> Result<Self, DnsError> {
        let exchange = validate_name("exchange", exchange)?;
        Self::new(
            name,
            RecordKind::MX,
            ttl,
            Payload::Mx {
                preference,
                exchange,
            },
        )
    }

    /// SOA record. `timers` is `[refresh, retry, expire, minimum]`.
    pub fn new_soa(
        name: &str,
        ttl: u32,
        mname: &str,
        rname: &str,
        serial: u32,
        timers: [u32; 4],
    ) -> Result<Self, DnsError> {
        let [refresh, retry, expire, minimum] = timers;
        Self::new(
            name,
            RecordKind::SOA,
            ttl,
            Payload::Soa {
                mname: validate_name("mname", mname)?,
                rname: validate_name("rname", rname)?,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            },
        )
    }

    /// Normalized owner name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record type.
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Time to live in seconds.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Type-specific data.
    pub fn data(&self) -> &Payload {
        &self.data
    }

    /// The address carried by an A/AAAA record.
    pub fn address(&self) -> Option<IpAddr> {
        match self.data {
            Payload::Address(ip) => Some(ip),
            _ => None,
        }
    }

    /// Canonical presentation line: `<name> <ttl> IN <type> <rdata>`.
    pub fn presentation(&self) -> String {
        format!(
            "{} {} IN {} {}",
            self.name,
            self.ttl,
            self.kind,
            self.data.rdata()
        )
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.presentation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_record_presentation() {
        let record =
            ResourceRecord::new_address(RecordKind::A, "Ipv4-Single-Target.Grpc.Com", 2100, "1.2.3.4")
                .unwrap();
        assert_eq!(record.name(), "ipv4-single-target.grpc.com.");
        assert_eq!(
            record.presentation(),
            "ipv4-single-target.grpc.com. 2100 IN A 1.2.3.4"
        );
    }

    #[test]
    fn test_address_family_must_match() {
        let err = ResourceRecord::new_address(RecordKind::A, "x.grpc.com.", 60, "2607:f8b0::1")
            .unwrap_err();
        assert!(matches!(err, DnsError::InvalidRecord { field: "address", .. }));

        let err =
            ResourceRecord::new_address(RecordKind::AAAA, "x.grpc.com.", 60, "1.2.3.4").unwrap_err();
        assert!(matches!(err, DnsError::InvalidRecord { field: "address", .. }));

        let err = ResourceRecord::new_address(RecordKind::TXT, "x.grpc.com.", 60, "1.2.3.4")
            .unwrap_err();
        assert!(matches!(err, DnsError::InvalidRecord { field: "type", .. }));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = ResourceRecord::new_txt("", 60, "hello").unwrap_err();
        assert!(matches!(err, DnsError::InvalidRecord { field: "name", .. }));

        let err = ResourceRecord::new_txt("a..b.", 60, "hello").unwrap_err();
        assert!(matches!(err, DnsError::InvalidRecord { field: "name", .. }));
    }

    #[test]
    fn test_srv_presentation() {
        let record = ResourceRecord::new_srv(
            "_grpclb._tcp.srv-ipv4-single-target.grpc.com.",
            2100,
            0,
            0,
            1234,
            "ipv4-single-target.grpc.com",
        )
        .unwrap();
        assert_eq!(
            record.data().rdata(),
            "0 0 1234 ipv4-single-target.grpc.com."
        );
    }

    #[test]
    fn test_srv_port_out_of_range() {
        let err = Payload::parse(RecordKind::SRV, "0 0 70000 target.grpc.com.").unwrap_err();
        assert!(matches!(err, DnsError::InvalidRecord { field: "port", .. }));
    }

    #[test]
    fn test_srv_parse() {
        let payload = Payload::parse(RecordKind::SRV, "0 5 1234 Target.Grpc.Com").unwrap();
        assert_eq!(
            payload,
            Payload::Srv {
                priority: 0,
                weight: 5,
                port: 1234,
                target: "target.grpc.com.".to_string(),
            }
        );
    }

    #[test]
    fn test_txt_quoting_and_parse() {
        let text = r#"grpc_config=[{"loadBalancingPolicy":"round_robin"}]"#;
        let payload = Payload::Text(text.to_string());
        let rdata = payload.rdata();
        assert_eq!(
            rdata,
            r#""grpc_config=[{\"loadBalancingPolicy\":\"round_robin\"}]""#
        );
        assert_eq!(Payload::parse(RecordKind::TXT, &rdata).unwrap(), payload);
    }

    #[test]
    fn test_bare_txt_words_keep_spaces() {
        assert_eq!(
            Payload::parse(RecordKind::TXT, "hello world").unwrap(),
            Payload::Text("hello world".to_string())
        );
        assert_eq!(
            Payload::parse(RecordKind::TXT, r#""hello" "world""#).unwrap(),
            Payload::Text("helloworld".to_string())
        );
    }

    #[test]
    fn test_long_txt_is_chunked() {
        let text = "x".repeat(600);
        let chunks = text_chunks(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 255);
        assert_eq!(chunks[2].len(), 90);

        let payload = Payload::Text(text.clone());
        assert_eq!(
            Payload::parse(RecordKind::TXT, &payload.rdata()).unwrap(),
            payload
        );
    }

    #[test]
    fn test_tokenize_decimal_escape() {
        let tokens = tokenize(r#"a "b\032c" d"#).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].text, "b c");
        assert!(tokens[1].quoted);

        assert!(tokenize(r#""unterminated"#).is_err());
    }

    #[test]
    fn test_record_kind_round_trip_through_hickory() {
        for kind in RecordKind::ALL {
            let rtype: RecordType = kind.into();
            assert_eq!(RecordKind::try_from(rtype).unwrap(), kind);
            assert_eq!(kind.to_string().parse::<RecordKind>().unwrap(), kind);
        }
        assert!(RecordKind::try_from(RecordType::PTR).is_err());
    }

    #[test]
    fn test_normalize_case_and_dot() {
        assert_eq!(normalize_name("Foo.Bar."), normalize_name("foo.bar"));
        assert_eq!(normalize_name("."), ".");
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_normalize_idempotent(name in "[a-zA-Z0-9-]{1,20}(\\.[a-zA-Z0-9-]{1,20}){0,3}\\.?") {
            let once = normalize_name(&name);
            prop_assert_eq!(normalize_name(&once), once.clone());
            prop_assert_eq!(normalize_name(&name.to_uppercase()), once);
        }

        #[test]
        fn test_txt_rdata_round_trip(text in "[ -~]{0,600}") {
            prop_assume!(!text.is_empty());
            let payload = Payload::Text(text);
            prop_assert_eq!(Payload::parse(RecordKind::TXT, &payload.rdata()).unwrap(), payload);
        }
    }
}
