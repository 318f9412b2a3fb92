//! Policy key gate.

use activesync_types::{Command, Device, ProvisioningMode};

/// Body of the 449 answer.
pub const PROVISIONING_REQUIRED_BODY: &str = "Retry after sending a PROVISION command";

/// HTTP status asking the client to provision first.
pub const PROVISIONING_REQUIRED_STATUS: u16 = 449;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    /// Answer 449 without running the command
    ProvisioningRequired,
}

/// Decide whether `command` may run before the device re-provisions.
///
/// `presented` is the key the client sent, `None` when it sent none.
pub fn check(
    mode: ProvisioningMode,
    command: Command,
    device: &Device,
    presented: Option<u32>,
) -> GateDecision {
    if mode == ProvisioningMode::Disabled || command.is_provisioning_exempt() {
        return GateDecision::Proceed;
    }

    // A pending wipe is only delivered through Provision.
    if device.is_wipe_pending() {
        return GateDecision::ProvisioningRequired;
    }

    let key_matches = match (mode, presented) {
        (ProvisioningMode::Loose, None) => true,
        (_, presented) => presented.unwrap_or(0) == device.policykey,
    };

    if key_matches {
        GateDecision::Proceed
    } else {
        GateDecision::ProvisioningRequired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activesync_types::RemoteWipeStatus;

    fn device(policykey: u32) -> Device {
        let mut device = Device::new("DEV", "alice");
        device.policykey = policykey;
        device
    }

    #[test]
    fn test_enforced() {
        let dev = device(1234);
        let mode = ProvisioningMode::Enforced;
        assert_eq!(check(mode, Command::Sync, &dev, Some(1234)), GateDecision::Proceed);
        assert_eq!(check(mode, Command::Sync, &dev, Some(1)), GateDecision::ProvisioningRequired);
        assert_eq!(check(mode, Command::Sync, &dev, None), GateDecision::ProvisioningRequired);
        assert_eq!(check(mode, Command::Provision, &dev, Some(1)), GateDecision::Proceed);
        assert_eq!(check(mode, Command::Autodiscover, &dev, None), GateDecision::Proceed);
    }

    #[test]
    fn test_enforced_unprovisioned_device_without_key() {
        assert_eq!(
            check(ProvisioningMode::Enforced, Command::FolderSync, &device(0), None),
            GateDecision::Proceed
        );
    }

    #[test]
    fn test_loose() {
        let dev = device(1234);
        let mode = ProvisioningMode::Loose;
        assert_eq!(check(mode, Command::Sync, &dev, None), GateDecision::Proceed);
        assert_eq!(check(mode, Command::Sync, &dev, Some(1234)), GateDecision::Proceed);
        assert_eq!(check(mode, Command::Sync, &dev, Some(5)), GateDecision::ProvisioningRequired);
    }

    #[test]
    fn test_disabled_ignores_everything() {
        let mut dev = device(1234);
        dev.rwstatus = RemoteWipeStatus::Pending;
        assert_eq!(check(ProvisioningMode::Disabled, Command::Sync, &dev, Some(5)), GateDecision::Proceed);
    }

    #[test]
    fn test_pending_wipe() {
        let mut dev = device(0);
        dev.rwstatus = RemoteWipeStatus::Pending;
        assert_eq!(
            check(ProvisioningMode::Loose, Command::Ping, &dev, None),
            GateDecision::ProvisioningRequired
        );
        assert_eq!(check(ProvisioningMode::Enforced, Command::Provision, &dev, None), GateDecision::Proceed);
    }
}
