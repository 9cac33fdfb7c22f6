//! Process-wide transport security initialization.
//!
//! Connector construction must harden the TLS stack before the first
//! network call. The install is a one-time process-wide side effect;
//! constructing further connectors must not reconfigure it.

use once_cell::sync::OnceCell;

static TLS_INIT: OnceCell<()> = OnceCell::new();

/// Install the process default TLS crypto provider.
///
/// Idempotent: the first caller wins, later calls are no-ops. A provider
/// already installed elsewhere in the process is left in place.
pub fn init_transport_security() {
    TLS_INIT.get_or_init(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
