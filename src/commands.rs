// Admin commands - the fixed set of maintenance actions sent to /command
use anyhow::{bail, Result};

use crate::i18n::Labels;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    Test,
    Update,
    Rollback,
    Reboot,
    PowerOff,
}

impl AdminCommand {
    pub const ALL: [AdminCommand; 5] = [
        AdminCommand::Test,
        AdminCommand::Update,
        AdminCommand::Rollback,
        AdminCommand::Reboot,
        AdminCommand::PowerOff,
    ];

    pub fn from_token(token: &str) -> Result<Self> {
        match token.trim() {
            "test" => Ok(AdminCommand::Test),
            "update" => Ok(AdminCommand::Update),
            "rollback" => Ok(AdminCommand::Rollback),
            "reboot" => Ok(AdminCommand::Reboot),
            "mm" => Ok(AdminCommand::PowerOff),
            other => bail!("Unknown command '{}' (expected one of: test, update, rollback, reboot, mm)", other),
        }
    }

    /// Value of the `cmd` form field.
    pub fn token(&self) -> &'static str {
        match self {
            AdminCommand::Test => "test",
            AdminCommand::Update => "update",
            AdminCommand::Rollback => "rollback",
            AdminCommand::Reboot => "reboot",
            AdminCommand::PowerOff => "mm",
        }
    }

    /// Title and body of the dialog shown once the appliance accepted the command.
    /// Update and rollback report the appliance's own output.
    pub fn overlay(&self, labels: &Labels, response: &str) -> Overlay {
        let (title, text) = match self {
            AdminCommand::Test => ("Test".to_string(), "Test command acknowledged".to_string()),
            AdminCommand::Update => (labels.update.clone(), response.to_string()),
            AdminCommand::Rollback => (labels.rollback.clone(), response.to_string()),
            AdminCommand::Reboot => (labels.restart.clone(), "Restarting...".to_string()),
            AdminCommand::PowerOff => (labels.power_off.clone(), "Powered off".to_string()),
        };
        Overlay { title, text }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub title: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_off_token() {
        assert_eq!(AdminCommand::from_token("mm").unwrap(), AdminCommand::PowerOff);
        assert_eq!(AdminCommand::PowerOff.token(), "mm");
        assert!(AdminCommand::from_token("poweroff").is_err());
    }

    #[test]
    fn test_unknown_token() {
        let err = AdminCommand::from_token("format-disk").unwrap_err();
        assert!(err.to_string().contains("format-disk"));
    }

    #[test]
    fn test_overlay_text() {
        let labels = Labels::default();
        let update = AdminCommand::Update.overlay(&labels, "Already up to date");
        assert_eq!(update.title, "Update");
        assert_eq!(update.text, "Already up to date");

        let reboot = AdminCommand::Reboot.overlay(&labels, "ignored");
        assert_eq!(reboot.title, "Restart");
        assert_eq!(reboot.text, "Restarting...");

        let off = AdminCommand::PowerOff.overlay(&labels, "");
        assert_eq!(off.text, "Powered off");
    }
}
