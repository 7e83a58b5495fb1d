use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::Sha256;

static FORWARDED_FOR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#"for="?(?P<ip>[^;,"]+)"#).ok());

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(forwarded_for);
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.and_then(|s| IpAddr::from_str(&s).ok())
    })
}

fn forwarded_for(header: &str) -> Option<IpAddr> {
    let re = FORWARDED_FOR.as_ref()?;
    let ip = re.captures(header)?.name("ip")?.as_str();
    IpAddr::from_str(ip.trim_start_matches('[').trim_end_matches(']')).ok()
}

/// Compares two tokens without leaking, through timing, how much of them matched.
///
/// Both values are MACed under a per-call random key, and the tags are compared in constant time.
pub fn tokens_match(presented: &str, expected: &str) -> bool {
    let key = rand::random::<[u8; 32]>();
    let tag = |value: &str| {
        // HMAC accepts keys of any length
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&key).ok()?;
        mac.update(value.as_bytes());
        Some(mac.finalize())
    };
    match (tag(presented), tag(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
