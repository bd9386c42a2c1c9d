//! Test virtual port detection (e.g., a `/dev/ttyUSB*` socat-bridged
//! Smoothieware simulator used in local development).

use smoothie_comm::communication::serial::list_ports;

#[test]
fn test_virtual_port_detection() {
    // This test verifies that a virtual board-side port is detected when
    // one exists on the system (e.g. a socat pty pair standing in for a
    // real board during local testing).

    match list_ports() {
        Ok(ports) => {
            #[cfg(target_os = "linux")]
            {
                let virtual_port = std::path::Path::new("/dev/ttyUSB99");
                if virtual_port.exists() {
                    let found = ports.iter().any(|p| p.port_name == "/dev/ttyUSB99");
                    assert!(
                        found,
                        "/dev/ttyUSB99 exists but was not detected in port listing"
                    );
                }
            }
        }
        Err(e) => {
            panic!("Failed to list ports: {}", e);
        }
    }
}
