use crate::error::ResolutionError;
use std::net::SocketAddr;
use tokio::net;

/// Resolves `host` and `port` into a single connectable address.
///
/// IPv4 addresses are preferred when the host resolves to both families.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ResolutionError> {
    let addr = format!("{}:{}", host, port);

    let candidates = net::lookup_host((host, port))
        .await
        .map_err(|source| ResolutionError::Lookup {
            addr: addr.clone(),
            source,
        })?
        .collect::<Vec<_>>();

    let resolved = candidates
        .iter()
        .find(|candidate| candidate.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or(ResolutionError::NoAddresses { addr: addr.clone() })?;

    log::debug!("resolved {} to {}", addr, resolved);

    Ok(resolved)
}
