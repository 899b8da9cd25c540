use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use anyhow::{anyhow, Context, Result};
use shared::protocol::PING_MODE_READABLE;
use wake_on_access::NetworkProvider;

/// Wake packets go to the discard port
const WAKE_PORT: u16 = 9;

/// Network primitives backed by the Linux kernel's sysfs/procfs views, the
/// system resolver and the `ping` binary.
pub struct SystemNetwork {
    sys_class_net: PathBuf,
    arp_table: PathBuf,
}

impl SystemNetwork {
    pub fn new() -> Self {
        Self {
            sys_class_net: PathBuf::from("/sys/class/net"),
            arp_table: PathBuf::from("/proc/net/arp"),
        }
    }

    #[cfg(test)]
    fn with_paths(sys_class_net: impl Into<PathBuf>, arp_table: impl Into<PathBuf>) -> Self {
        Self {
            sys_class_net: sys_class_net.into(),
            arp_table: arp_table.into(),
        }
    }

    /// Non-loopback interfaces, sorted by name
    fn interfaces(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.sys_class_net) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Can't list {}: {}", self.sys_class_net.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name != "lo")
            .collect();
        names.sort();
        names
    }

    fn operstate(&self, interface: &str) -> Option<String> {
        std::fs::read_to_string(self.sys_class_net.join(interface).join("operstate"))
            .ok()
            .map(|state| state.trim().to_string())
    }

    fn broadcast_wake(&self, hardware_id: &str) -> Result<()> {
        let mac = parse_hardware_id(hardware_id)
            .ok_or_else(|| anyhow!("Invalid hardware id '{}'", hardware_id))?;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).context("Failed to bind UDP socket")?;
        socket.set_broadcast(true).context("Failed to enable broadcast")?;
        socket
            .send_to(&magic_packet(&mac), (Ipv4Addr::BROADCAST, WAKE_PORT))
            .context("Failed to send wake packet")?;
        Ok(())
    }
}

impl Default for SystemNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkProvider for SystemNetwork {
    fn is_connected(&self) -> bool {
        self.interfaces()
            .iter()
            .any(|iface| self.operstate(iface).as_deref() == Some("up"))
    }

    fn resolve_address(&self, host: &str) -> Option<IpAddr> {
        if let Ok(addr) = host.parse::<IpAddr>() {
            return Some(addr);
        }

        let addrs: Vec<IpAddr> = match (host, 0).to_socket_addrs() {
            Ok(addrs) => addrs.map(|a| a.ip()).collect(),
            Err(e) => {
                tracing::debug!("Failed to resolve '{}': {}", host, e);
                return None;
            }
        };
        // wake packets and the ARP table are IPv4 business
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
    }

    fn send_wake_signal(&self, hardware_id: &str) -> bool {
        match self.broadcast_wake(hardware_id) {
            Ok(()) => {
                tracing::debug!("Sent wake packet to {}", hardware_id);
                true
            }
            Err(e) => {
                tracing::error!("{:#}", e);
                false
            }
        }
    }

    fn probe(&self, addr: IpAddr, port: u16, timeout: Duration, mode: u16) -> bool {
        if port == 0 {
            return ping(addr, timeout);
        }

        let stream = match TcpStream::connect_timeout(&SocketAddr::new(addr, port), timeout) {
            Ok(stream) => stream,
            Err(_) => return false,
        };
        if mode & PING_MODE_READABLE == 0 {
            return true;
        }

        // data or an orderly close both count as readable
        let mut buf = [0u8; 1];
        if stream.set_read_timeout(Some(timeout.max(Duration::from_millis(1)))).is_err() {
            return false;
        }
        stream.peek(&mut buf).is_ok()
    }

    fn local_interfaces(&self) -> Vec<String> {
        self.interfaces()
    }

    fn lookup_neighbor(&self, interface: &str, addr: IpAddr) -> Option<String> {
        let table = match std::fs::read_to_string(&self.arp_table) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!("Can't read {}: {}", self.arp_table.display(), e);
                return None;
            }
        };
        find_in_arp_table(&table, interface, addr)
    }
}

/// One ICMP echo via the system `ping`, which carries the raw socket privileges
fn ping(addr: IpAddr, timeout: Duration) -> bool {
    let wait_secs = timeout.as_secs_f64().ceil().max(1.0) as u64;
    Command::new("ping")
        .args(["-c", "1", "-W"])
        .arg(wait_secs.to_string())
        .arg(addr.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Parse "AA:BB:CC:DD:EE:FF" or "aa-bb-cc-dd-ee-ff"
pub fn parse_hardware_id(hardware_id: &str) -> Option<[u8; 6]> {
    let parts: Vec<&str> = hardware_id.trim().split([':', '-']).collect();
    if parts.len() != 6 {
        return None;
    }

    let mut mac = [0u8; 6];
    for (byte, part) in mac.iter_mut().zip(parts) {
        if part.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    Some(mac)
}

/// Six 0xFF bytes followed by the hardware address sixteen times
pub fn magic_packet(mac: &[u8; 6]) -> Vec<u8> {
    let mut packet = vec![0xFF; 6];
    for _ in 0..16 {
        packet.extend_from_slice(mac);
    }
    packet
}

/// Look `addr` up in the text of /proc/net/arp for `interface`
fn find_in_arp_table(table: &str, interface: &str, addr: IpAddr) -> Option<String> {
    let wanted = addr.to_string();

    // IP address, HW type, Flags, HW address, Mask, Device
    table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [ip, _, flags, hw, _, device] = fields.as_slice() else {
            return None;
        };
        if *ip != wanted || *device != interface {
            return None;
        }
        // incomplete entries
        if *flags == "0x0" || *hw == "00:00:00:00:00:00" {
            return None;
        }
        Some(hw.to_ascii_uppercase())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARP_TABLE: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.30     0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth0
192.168.1.31     0x1         0x0         00:00:00:00:00:00     *        eth0
192.168.1.30     0x1         0x2         11:22:33:44:55:66     *        wlan0
";

    fn nas() -> IpAddr {
        "192.168.1.30".parse().unwrap()
    }

    #[test]
    fn test_magic_packet_layout() {
        let mac = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        let packet = magic_packet(&mac);

        assert_eq!(packet.len(), 102);
        assert_eq!(&packet[..6], &[0xFF; 6]);
        assert!(packet[6..].chunks(6).all(|chunk| chunk == mac));
    }

    #[test]
    fn test_parse_hardware_id() {
        assert_eq!(
            parse_hardware_id("AA:BB:CC:DD:EE:FF"),
            Some([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])
        );
        assert_eq!(
            parse_hardware_id("00-11-22-33-44-5a"),
            Some([0x00, 0x11, 0x22, 0x33, 0x44, 0x5A])
        );
        assert_eq!(parse_hardware_id("AA:BB:CC:DD:EE"), None);
        assert_eq!(parse_hardware_id("AA:BB:CC:DD:EE:GG"), None);
        assert_eq!(parse_hardware_id("AAB:B:CC:DD:EE:FF"), None);
    }

    #[test]
    fn test_arp_lookup_per_interface() {
        assert_eq!(find_in_arp_table(ARP_TABLE, "eth0", nas()).as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(find_in_arp_table(ARP_TABLE, "wlan0", nas()).as_deref(), Some("11:22:33:44:55:66"));
        assert_eq!(find_in_arp_table(ARP_TABLE, "eth1", nas()), None);
    }

    #[test]
    fn test_arp_lookup_skips_incomplete() {
        let addr: IpAddr = "192.168.1.31".parse().unwrap();
        assert_eq!(find_in_arp_table(ARP_TABLE, "eth0", addr), None);
    }

    #[test]
    fn test_lookup_neighbor_reads_table_file() {
        let dir = tempfile::tempdir().unwrap();
        let arp = dir.path().join("arp");
        std::fs::write(&arp, ARP_TABLE).unwrap();

        let network = SystemNetwork::with_paths(dir.path().join("net"), &arp);

        assert_eq!(network.lookup_neighbor("eth0", nas()).as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn test_connectivity_from_operstate() {
        let dir = tempfile::tempdir().unwrap();
        for (iface, state) in [("lo", "unknown"), ("eth0", "down"), ("wlan0", "down")] {
            std::fs::create_dir_all(dir.path().join(iface)).unwrap();
            std::fs::write(dir.path().join(iface).join("operstate"), format!("{}\n", state)).unwrap();
        }

        let network = SystemNetwork::with_paths(dir.path(), dir.path().join("arp"));
        assert_eq!(network.local_interfaces(), vec!["eth0", "wlan0"]);
        assert!(!network.is_connected());

        std::fs::write(dir.path().join("wlan0").join("operstate"), "up\n").unwrap();
        assert!(network.is_connected());
    }

    #[test]
    fn test_resolve_literal_address() {
        let network = SystemNetwork::new();
        assert_eq!(network.resolve_address("192.168.1.30"), Some(nas()));
        assert_eq!(network.resolve_address("fd00::1"), Some("fd00::1".parse().unwrap()));
    }

    #[test]
    fn test_send_invalid_hardware_id_fails() {
        let network = SystemNetwork::new();
        assert!(!network.send_wake_signal("not-a-mac"));
    }
}
