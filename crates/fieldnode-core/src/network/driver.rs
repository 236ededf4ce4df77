use core::net::Ipv4Addr;

use crate::config::{PASSPHRASE_MAX_LEN, SSID_MAX_LEN};

use super::{Band, LinkDetails, Security, WifiError, WifiState};

/// Error code returned by the platform when it refuses a request outright
pub type DriverCode = i32;

/// Parameters of an association request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub ssid: heapless::String<SSID_MAX_LEN>,
    pub passphrase: heapless::String<PASSPHRASE_MAX_LEN>,
    pub security: Security,
    pub band: Band,
    /// `None` lets the radio pick any channel
    pub channel: Option<u8>,
}

impl ConnectParams {
    /// Validate credentials and derive the security mode.
    ///
    /// An empty passphrase means an open network; anything else is WPA/WPA2-PSK.
    pub fn new(ssid: &str, passphrase: &str) -> Result<Self, WifiError> {
        if ssid.is_empty() {
            return Err(WifiError::InvalidSsid);
        }
        let ssid = heapless::String::try_from(ssid).map_err(|_| WifiError::InvalidSsid)?;
        let security = if passphrase.is_empty() {
            Security::Open
        } else {
            Security::Psk
        };
        let passphrase =
            heapless::String::try_from(passphrase).map_err(|_| WifiError::InvalidPassphrase)?;

        Ok(Self {
            ssid,
            passphrase,
            security,
            band: Band::Band2_4GHz,
            channel: None,
        })
    }
}

/// IPv4 configuration currently applied to the interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Config {
    pub address: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
}

/// Point-in-time interface status straight from the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverStatus {
    pub state: WifiState,
    pub link: Option<LinkDetails>,
}

/// Request side of the platform Wi-Fi stack.
///
/// Every request returns as soon as the platform accepted or refused it.
/// Outcomes are reported later, from the platform's own dispatch context,
/// through [`NetworkEvents::dispatch`](super::NetworkEvents::dispatch).
pub trait WifiDriver {
    fn request_connect(&mut self, params: &ConnectParams) -> Result<(), DriverCode>;

    fn request_disconnect(&mut self) -> Result<(), DriverCode>;

    fn request_scan(&mut self) -> Result<(), DriverCode>;

    fn iface_status(&mut self) -> Result<DriverStatus, DriverCode>;

    /// `None` when no IPv4 configuration is applied to the interface.
    fn ipv4_config(&mut self) -> Option<Ipv4Config>;
}

impl<D: WifiDriver + ?Sized> WifiDriver for &mut D {
    fn request_connect(&mut self, params: &ConnectParams) -> Result<(), DriverCode> {
        (**self).request_connect(params)
    }

    fn request_disconnect(&mut self) -> Result<(), DriverCode> {
        (**self).request_disconnect()
    }

    fn request_scan(&mut self) -> Result<(), DriverCode> {
        (**self).request_scan()
    }

    fn iface_status(&mut self) -> Result<DriverStatus, DriverCode> {
        (**self).iface_status()
    }

    fn ipv4_config(&mut self) -> Option<Ipv4Config> {
        (**self).ipv4_config()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn test_connect_params_pick_security() {
        let psk = ConnectParams::new("home", "hunter22").unwrap();
        assert_eq!(psk.security, Security::Psk);
        assert_eq!(psk.band, Band::Band2_4GHz);
        assert_eq!(psk.channel, None);

        let open = ConnectParams::new("cafe", "").unwrap();
        assert_eq!(open.security, Security::Open);
    }

    #[test]
    fn test_connect_params_reject_bad_lengths() {
        assert_eq!(ConnectParams::new("", "x"), Err(WifiError::InvalidSsid));

        let long_ssid = "s".repeat(33);
        assert_eq!(
            ConnectParams::new(&long_ssid, "x"),
            Err(WifiError::InvalidSsid)
        );

        let long_pass = "p".repeat(65);
        assert_eq!(
            ConnectParams::new("home", &long_pass),
            Err(WifiError::InvalidPassphrase)
        );
    }
}
