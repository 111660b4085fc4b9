use std::net::{AddrParseError, IpAddr, Ipv4Addr, Ipv6Addr};
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefixError {
    #[error("Prefix must be in ADDRESS/LENGTH format")]
    Parts,
    #[error("Address part has wrong format: {0}")]
    Addr(#[from] AddrParseError),
    #[error("Length part has wrong format: {0}")]
    LenFormat(#[from] ParseIntError),
    #[error("Prefix length is too large: {0}")]
    LenTooLarge(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    addr: IpAddr,
    len: u32,
}

impl FromStr for Prefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s.split_once('/').ok_or(PrefixError::Parts)?;
        let addr: IpAddr = addr.parse()?;
        let len: u32 = len.parse()?;
        let bits = match addr {
            IpAddr::V4(_) => u32::BITS,
            IpAddr::V6(_) => u128::BITS,
        };
        if len > bits {
            return Err(PrefixError::LenTooLarge(len));
        }
        Ok(Self { addr, len })
    }
}

impl Prefix {
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn is_single(&self) -> bool {
        match self.addr {
            IpAddr::V4(_) => self.len == u32::BITS,
            IpAddr::V6(_) => self.len == u128::BITS,
        }
    }

    /// Judged on the as-written address: RFC1918 v4, RFC4193 fc00::/7 v6.
    pub fn is_private(&self) -> bool {
        match self.addr {
            IpAddr::V4(addr) => addr.is_private(),
            IpAddr::V6(addr) => (addr.segments()[0] & 0xfe00) == 0xfc00,
        }
    }

    /// The representative address: the sole address of a single-address
    /// prefix, the first usable host (network start plus one) otherwise.
    pub fn sample_addr(&self) -> IpAddr {
        if self.is_single() {
            return self.addr;
        }
        match self.addr {
            IpAddr::V4(addr) => {
                let mask = u32::MAX.checked_shl(u32::BITS - self.len).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from((u32::from(addr) & mask) + 1))
            }
            IpAddr::V6(addr) => {
                let mask = u128::MAX.checked_shl(u128::BITS - self.len).unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from((u128::from(addr) & mask) + 1))
            }
        }
    }
}
