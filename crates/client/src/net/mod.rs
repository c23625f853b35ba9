mod config;

use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::Context;

pub use config::ClientConfig;

/// Resolves `host:port`, taking the first address the resolver returns.
pub fn resolve_server_addr(input: &str) -> anyhow::Result<SocketAddr> {
    input
        .to_socket_addrs()
        .with_context(|| format!("invalid server address '{}'", input))?
        .next()
        .with_context(|| format!("server address '{}' did not resolve", input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_literal_addresses() {
        let addr = resolve_server_addr("127.0.0.1:27016").unwrap();
        assert_eq!(addr.port(), 27016);
        assert!(resolve_server_addr("not an address").is_err());
    }
}
