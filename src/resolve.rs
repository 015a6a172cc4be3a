use crate::error::{PingError, PingResult};
use std::net::IpAddr;

pub fn lookup_host(hostname: &str) -> PingResult<IpAddr> {
    let ips: Vec<IpAddr> = dns_lookup::lookup_host(hostname)
        .map_err(|e| PingError::AddressResolution(format!("{}: {}", hostname, e)))?;
    ips.into_iter().next().ok_or_else(|| {
        PingError::AddressResolution("could not resolve hostname ".to_owned() + hostname)
    })
}

pub fn lookup_host_v4(hostname: &str) -> PingResult<IpAddr> {
    let ips: Vec<IpAddr> = dns_lookup::lookup_host(hostname)
        .map_err(|e| PingError::AddressResolution(format!("{}: {}", hostname, e)))?;
    ips.into_iter()
        .find(|&e| matches!(e, IpAddr::V4(_)))
        .ok_or_else(|| {
            PingError::AddressResolution(
                "could not resolve ".to_owned() + hostname + " to IPv4",
            )
        })
}

pub fn lookup_host_v6(hostname: &str) -> PingResult<IpAddr> {
    let ips: Vec<IpAddr> = dns_lookup::lookup_host(hostname)
        .map_err(|e| PingError::AddressResolution(format!("{}: {}", hostname, e)))?;
    ips.into_iter()
        .find(|&e| matches!(e, IpAddr::V6(_)))
        .ok_or_else(|| {
            PingError::AddressResolution(
                "could not resolve ".to_owned() + hostname + " to IPv6",
            )
        })
}

pub fn lookup_addr(ip: IpAddr) -> PingResult<String> {
    dns_lookup::lookup_addr(&ip).map_err(|e| PingError::AddressResolution(format!("{}: {}", ip, e)))
}
