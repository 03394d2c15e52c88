use crate::error::{Error, Result, Stage};
use crate::protocol::AddressType;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

// Longest domain name a length-prefixed ATYP 0x03 field can carry
const MAX_DOMAIN_LEN: usize = u8::MAX as usize;

// Shortest buffer worth decoding: type + one body byte + port
const MIN_ADDRESS_LEN: usize = 1 + 1 + 2;

/// Host is the destination half of a SOCKS5 address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Ip(IpAddr),
    Domain(String),
}

/// Address represents a SOCKS5 target or bound address: an IPv4/IPv6
/// address or a domain name, plus a port.
///
/// The wire address type is derived from the host, so an IPv6 address
/// always encodes as ATYP 0x04 even when it is IPv4-mapped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    host: Host,
    port: u16,
}

impl Address {
    /// ip builds an address from an IP and port
    pub fn ip(ip: impl Into<IpAddr>, port: u16) -> Self {
        Self {
            host: Host::Ip(ip.into()),
            port,
        }
    }

    /// domain builds a domain-name address. The name must fit the one-byte
    /// length prefix and must not be empty.
    pub fn domain(name: impl Into<String>, port: u16) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::MalformedAddress("empty domain name"));
        }
        if name.len() > MAX_DOMAIN_LEN {
            return Err(Error::MalformedAddress("domain name longer than 255 bytes"));
        }

        Ok(Self {
            host: Host::Domain(name),
            port,
        })
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// address_type returns the ATYP this address encodes as
    pub fn address_type(&self) -> AddressType {
        match &self.host {
            Host::Ip(IpAddr::V4(_)) => AddressType::IPv4,
            Host::Ip(IpAddr::V6(_)) => AddressType::IPv6,
            Host::Domain(_) => AddressType::DomainName,
        }
    }

    /// encoded_len is the number of bytes to_bytes produces
    pub fn encoded_len(&self) -> usize {
        match &self.host {
            Host::Ip(IpAddr::V4(_)) => 1 + 4 + 2,
            Host::Ip(IpAddr::V6(_)) => 1 + 16 + 2,
            Host::Domain(name) => 1 + 1 + name.len() + 2,
        }
    }

    /// encode_into appends the wire form to buf
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        // SOCKS5 address format
        // +------+----------+----------+
        // | ATYP | DST.ADDR | DST.PORT |
        // +------+----------+----------+
        // |  1   | Variable |    2     |
        // +------+----------+----------+
        buf.push(self.address_type() as u8);

        match &self.host {
            Host::Ip(IpAddr::V4(ip)) => buf.extend_from_slice(&ip.octets()),
            Host::Ip(IpAddr::V6(ip)) => buf.extend_from_slice(&ip.octets()),
            Host::Domain(name) => {
                // Length checked at construction
                buf.push(name.len() as u8);
                buf.extend_from_slice(name.as_bytes());
            }
        }

        buf.extend_from_slice(&self.port.to_be_bytes());
    }

    /// to_bytes returns the wire form of the address
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// decode parses an address from a complete buffer. Bytes past the port
    /// are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.is_empty() {
            return Err(Error::MalformedAddress("empty buffer"));
        }

        if buf.len() <= MIN_ADDRESS_LEN {
            return Err(Error::MalformedAddress("not enough bytes"));
        }

        let addr_type =
            AddressType::from_byte(buf[0]).ok_or(Error::UnsupportedAddressType(buf[0]))?;

        let (host, rest) = match addr_type {
            AddressType::IPv4 => {
                let body = check_len(buf, 1 + 4 + 2)?;
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&body[..4]);
                (Host::Ip(Ipv4Addr::from(octets).into()), &body[4..])
            }
            AddressType::IPv6 => {
                let body = check_len(buf, 1 + 16 + 2)?;
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&body[..16]);
                (Host::Ip(Ipv6Addr::from(octets).into()), &body[16..])
            }
            AddressType::DomainName => {
                // First octet holds the number of octets to follow
                let domain_len = buf[1] as usize;
                let body = check_len(buf, 1 + 1 + domain_len + 2)?;
                let name = std::str::from_utf8(&body[1..1 + domain_len])
                    .map_err(|_| Error::MalformedAddress("domain name is not valid UTF-8"))?;
                (Host::Domain(name.to_owned()), &body[1 + domain_len..])
            }
        };

        let port = u16::from_be_bytes([rest[0], rest[1]]);

        Ok(Self { host, port })
    }

    /// read_from reads exactly one address off a stream, starting with the
    /// type byte
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut atyp = [0u8; 1];
        reader
            .read_exact(&mut atyp)
            .await
            .map_err(Error::transport(Stage::AddressType))?;

        Self::read_with_type(reader, atyp[0]).await
    }

    /// read_with_type reads the rest of an address whose type byte has
    /// already been consumed. Nothing past the port is read.
    pub async fn read_with_type<R>(reader: &mut R, atyp: u8) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let addr_type = AddressType::from_byte(atyp).ok_or(Error::UnsupportedAddressType(atyp))?;

        let mut buf = vec![atyp];

        if addr_type == AddressType::DomainName {
            let mut len = [0u8; 1];
            reader
                .read_exact(&mut len)
                .await
                .map_err(Error::transport(Stage::DomainLength))?;
            buf.push(len[0]);
        }

        let body_start = buf.len();
        let body_len = match addr_type {
            AddressType::DomainName => buf[1] as usize + 2,
            _ => addr_type.fixed_len(),
        };
        buf.resize(body_start + body_len, 0);

        reader
            .read_exact(&mut buf[body_start..])
            .await
            .map_err(Error::transport(Stage::AddressBody))?;

        Self::decode(&buf)
    }
}

// check_len returns the bytes after the type byte if buf holds at least needed bytes
fn check_len(buf: &[u8], needed: usize) -> Result<&[u8]> {
    if buf.len() < needed {
        return Err(Error::TruncatedAddress {
            needed,
            available: buf.len(),
        });
    }
    Ok(&buf[1..])
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::ip(addr.ip(), addr.port())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Ip(ip) => write!(f, "{}", SocketAddr::new(*ip, self.port)),
            Host::Domain(name) if name.contains(':') => write!(f, "[{name}]:{}", self.port),
            Host::Domain(name) => write!(f, "{name}:{}", self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Address> {
        vec![
            Address::ip(Ipv4Addr::new(127, 0, 0, 1), 80),
            Address::ip(Ipv6Addr::LOCALHOST, 80),
            Address::ip(Ipv4Addr::new(10, 1, 2, 3).to_ipv6_mapped(), 65535),
            Address::domain("www.qq.com", 80).unwrap(),
            Address::domain("a", 0).unwrap(),
            Address::domain("x".repeat(255), 443).unwrap(),
        ]
    }

    #[test]
    fn decode_inverts_encode() {
        for addr in samples() {
            let bytes = addr.to_bytes();
            assert_eq!(bytes.len(), addr.encoded_len());
            assert_eq!(Address::decode(&bytes).unwrap(), addr);
        }
    }

    #[tokio::test]
    async fn stream_decode_matches_buffer_decode() {
        for addr in samples() {
            let bytes = addr.to_bytes();
            let mut reader = &bytes[..];
            let streamed = Address::read_from(&mut reader).await.unwrap();
            assert_eq!(streamed, Address::decode(&bytes).unwrap());
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn ipv4_wire_form() {
        let addr = Address::ip(Ipv4Addr::new(127, 0, 0, 1), 80);
        assert_eq!(addr.to_bytes(), [0x01, 127, 0, 0, 1, 0x00, 0x50]);
    }

    #[test]
    fn domain_wire_form() {
        let addr = Address::domain("www.qq.com", 80).unwrap();
        let mut expected = vec![0x03, 10];
        expected.extend_from_slice(b"www.qq.com");
        expected.extend_from_slice(&[0x00, 0x50]);
        assert_eq!(addr.to_bytes(), expected);
    }

    #[test]
    fn short_buffers_are_malformed() {
        assert!(matches!(
            Address::decode(&[]),
            Err(Error::MalformedAddress(_))
        ));
        for len in 1..=4 {
            let buf = vec![0x01; len];
            assert!(matches!(
                Address::decode(&buf),
                Err(Error::MalformedAddress(_))
            ));
        }
    }

    #[test]
    fn truncated_payloads() {
        // IPv4 missing the last port byte
        assert!(matches!(
            Address::decode(&[0x01, 127, 0, 0, 1, 0x00]),
            Err(Error::TruncatedAddress {
                needed: 7,
                available: 6
            })
        ));
        // IPv6 with only 10 bytes of address
        let mut v6 = vec![0x04];
        v6.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            Address::decode(&v6),
            Err(Error::TruncatedAddress { .. })
        ));
        // Domain declaring 10 bytes but carrying 3
        assert!(matches!(
            Address::decode(&[0x03, 10, b'a', b'b', b'c', 0x00, 0x50]),
            Err(Error::TruncatedAddress { .. })
        ));
    }

    #[test]
    fn unknown_types_rejected() {
        for atyp in [0u8, 2, 5, 255] {
            let buf = [atyp, 1, 2, 3, 4, 5, 6, 7];
            assert!(matches!(
                Address::decode(&buf),
                Err(Error::UnsupportedAddressType(t)) if t == atyp
            ));
        }
    }

    #[test]
    fn trailing_bytes_ignored() {
        let buf = [0x01, 1, 2, 3, 4, 0x01, 0xBB, 0xDE, 0xAD];
        let addr = Address::decode(&buf).unwrap();
        assert_eq!(addr, Address::ip(Ipv4Addr::new(1, 2, 3, 4), 443));
    }

    #[test]
    fn invalid_utf8_domain() {
        let buf = [0x03, 2, 0xFF, 0xFE, 0x00, 0x50];
        assert!(matches!(
            Address::decode(&buf),
            Err(Error::MalformedAddress(_))
        ));
    }

    #[test]
    fn domain_constructor_limits() {
        assert!(Address::domain("", 80).is_err());
        assert!(Address::domain("x".repeat(256), 80).is_err());
    }

    #[tokio::test]
    async fn stream_reads_only_the_address() {
        let mut bytes = Address::domain("example.com", 8080).unwrap().to_bytes();
        bytes.extend_from_slice(b"payload");
        let mut reader = &bytes[..];
        let addr = Address::read_from(&mut reader).await.unwrap();
        assert_eq!(addr.port(), 8080);
        assert_eq!(reader, b"payload");
    }

    #[tokio::test]
    async fn short_stream_names_the_field() {
        let mut reader: &[u8] = &[0x03];
        let err = Address::read_from(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport {
                stage: Stage::DomainLength,
                ..
            }
        ));

        let mut reader: &[u8] = &[0x04, 0, 0, 0];
        let err = Address::read_from(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport {
                stage: Stage::AddressBody,
                ..
            }
        ));

        let mut reader: &[u8] = &[];
        let err = Address::read_from(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport {
                stage: Stage::AddressType,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stream_rejects_unknown_type_without_reading_more() {
        let mut reader: &[u8] = &[0x05, 1, 2, 3];
        let err = Address::read_from(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedAddressType(0x05)));
        assert_eq!(reader, &[1, 2, 3]);
    }

    #[test]
    fn display() {
        assert_eq!(
            Address::ip(Ipv4Addr::new(127, 0, 0, 1), 80).to_string(),
            "127.0.0.1:80"
        );
        assert_eq!(Address::ip(Ipv6Addr::LOCALHOST, 80).to_string(), "[::1]:80");
        assert_eq!(
            Address::domain("www.qq.com", 80).unwrap().to_string(),
            "www.qq.com:80"
        );
        assert_eq!(
            Address::domain("fe80::1%eth0", 22).unwrap().to_string(),
            "[fe80::1%eth0]:22"
        );
    }
}
