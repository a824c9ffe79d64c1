//! Network bring-up: scan, associate, then check status once per tick until
//! an address is leased, the station is refused, or the budget runs out.

use std::net::Ipv4Addr;

use crate::error::BootstrapError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Associated, with this address leased. `0.0.0.0` still counts as pending.
    Up(Ipv4Addr),
    /// Associating or waiting for DHCP.
    Pending,
    /// The station dropped out of the attempt (wrong password, AP refused it, ...).
    Refused(String),
}

/// A station interface that has been configured and started.
///
/// # Implementations
/// - **Device:** `WifiManager` in the firmware crate (ESP-IDF station)
/// - **Host:** [`crate::sim::ScriptedLink`]
pub trait Link {
    /// Signal strength of the target network if a scan saw it. Informational only.
    fn scan(&mut self) -> Option<i8>;
    /// Non-blocking association request.
    fn associate(&mut self) -> Result<(), BootstrapError>;
    fn status(&mut self) -> LinkStatus;
    /// Block for one status tick (one second on the device).
    fn wait_tick(&mut self);
}

/// Bring the link up within `timeout_ticks` status checks.
pub fn bring_up<L: Link + ?Sized>(link: &mut L, timeout_ticks: u32) -> Result<Ipv4Addr, BootstrapError> {
    match link.scan() {
        Some(rssi) => log::info!("Found network (signal: {} dBm)", rssi),
        // Hidden SSIDs and missed beacons still associate
        None => log::warn!("Network not seen in scan, associating anyway"),
    }

    link.associate()?;

    for tick in 1..=timeout_ticks {
        match link.status() {
            LinkStatus::Up(ip) if !ip.is_unspecified() => {
                log::info!("Connected after {}s, IP: {}", tick - 1, ip);
                return Ok(ip);
            }
            LinkStatus::Refused(reason) => {
                log::error!("WiFi association rejected: {}", reason);
                return Err(BootstrapError::Rejected(reason));
            }
            LinkStatus::Up(_) | LinkStatus::Pending => {
                log::info!("Waiting for connection... ({}/{})", tick, timeout_ticks);
                link.wait_tick();
            }
        }
    }

    log::error!("WiFi connection failed after {} checks", timeout_ticks);
    Err(BootstrapError::Timeout { ticks: timeout_ticks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedLink;

    const IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

    #[test]
    fn test_up_after_pending() {
        let mut link = ScriptedLink::new(vec![LinkStatus::Pending, LinkStatus::Pending, LinkStatus::Up(IP)]);
        assert_eq!(bring_up(&mut link, 10), Ok(IP));
        assert_eq!(link.ticks_waited(), 2);
        assert_eq!(link.associations(), 1);
    }

    #[test]
    fn test_scan_miss_is_not_fatal() {
        let mut link = ScriptedLink::new(vec![LinkStatus::Up(IP)]);
        link.set_scan(None);
        assert_eq!(bring_up(&mut link, 3), Ok(IP));
    }

    #[test]
    fn test_refusal_fails_early() {
        let mut link = ScriptedLink::new(vec![
            LinkStatus::Pending,
            LinkStatus::Refused("auth failed (202)".into()),
        ]);
        assert_eq!(
            bring_up(&mut link, 10),
            Err(BootstrapError::Rejected("auth failed (202)".into()))
        );
        assert_eq!(link.ticks_waited(), 1);
    }

    #[test]
    fn test_timeout_uses_whole_budget() {
        let mut link = ScriptedLink::new(vec![LinkStatus::Pending]);
        assert_eq!(bring_up(&mut link, 4), Err(BootstrapError::Timeout { ticks: 4 }));
        assert_eq!(link.ticks_waited(), 4);
    }

    #[test]
    fn test_unspecified_address_is_pending() {
        let mut link = ScriptedLink::new(vec![LinkStatus::Up(Ipv4Addr::UNSPECIFIED), LinkStatus::Up(IP)]);
        assert_eq!(bring_up(&mut link, 5), Ok(IP));
        assert_eq!(link.ticks_waited(), 1);
    }

    #[test]
    fn test_association_request_error() {
        let mut link = ScriptedLink::new(vec![LinkStatus::Up(IP)]);
        link.fail_association("ESP_ERR_WIFI_CONN");
        assert!(matches!(bring_up(&mut link, 5), Err(BootstrapError::Request(_))));
        assert_eq!(link.ticks_waited(), 0);
    }
}
