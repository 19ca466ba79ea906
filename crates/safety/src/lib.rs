use decom_core::DeviceLiveness;
use uuid::Uuid;

pub const CONFIRMATION_PREFIX: &str = "DECOM-";

#[derive(Debug, Clone)]
pub struct SafetyContext {
    pub force_mode: bool,
    pub confirmation_token: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyDecision {
    Allow,
    Deny(String),
}

impl SafetyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

pub fn require_confirmation_token() -> String {
    format!("{}{}", CONFIRMATION_PREFIX, Uuid::new_v4())
}

/// Purging is irreversible, so a real run needs both force-mode and a
/// confirmation token. Dry runs never mutate and are always allowed.
pub fn check_operator_intent(ctx: &SafetyContext) -> SafetyDecision {
    if ctx.dry_run {
        return SafetyDecision::Allow;
    }
    if !ctx.force_mode {
        return SafetyDecision::Deny("Denied: device removal requires --force".to_string());
    }

    let Some(token) = &ctx.confirmation_token else {
        return SafetyDecision::Deny("Denied: confirmation token missing".to_string());
    };
    let Some(suffix) = token.strip_prefix(CONFIRMATION_PREFIX) else {
        return SafetyDecision::Deny("Denied: invalid confirmation token".to_string());
    };
    if Uuid::parse_str(suffix).is_err() {
        return SafetyDecision::Deny("Denied: invalid confirmation token".to_string());
    }

    SafetyDecision::Allow
}

pub fn can_purge(liveness: DeviceLiveness) -> SafetyDecision {
    match liveness {
        DeviceLiveness::Down => SafetyDecision::Allow,
        DeviceLiveness::Up => {
            SafetyDecision::Deny("device is up; it must be down before it can be removed".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(force_mode: bool, token: Option<&str>) -> SafetyContext {
        SafetyContext {
            force_mode,
            confirmation_token: token.map(str::to_string),
            dry_run: false,
        }
    }

    #[test]
    fn denies_without_force() {
        let token = require_confirmation_token();
        assert!(matches!(
            check_operator_intent(&ctx(false, Some(&token))),
            SafetyDecision::Deny(_)
        ));
    }

    #[test]
    fn denies_without_token() {
        assert!(matches!(
            check_operator_intent(&ctx(true, None)),
            SafetyDecision::Deny(_)
        ));
    }

    #[test]
    fn denies_invalid_token() {
        assert!(matches!(
            check_operator_intent(&ctx(true, Some("BAD"))),
            SafetyDecision::Deny(_)
        ));
        assert!(matches!(
            check_operator_intent(&ctx(true, Some("DECOM-not-a-uuid"))),
            SafetyDecision::Deny(_)
        ));
    }

    #[test]
    fn allows_with_token() {
        let token = require_confirmation_token();
        assert_eq!(check_operator_intent(&ctx(true, Some(&token))), SafetyDecision::Allow);
    }

    #[test]
    fn dry_run_needs_no_token() {
        let ctx = SafetyContext {
            force_mode: false,
            confirmation_token: None,
            dry_run: true,
        };
        assert!(check_operator_intent(&ctx).is_allowed());
    }

    #[test]
    fn only_down_devices_can_be_purged() {
        assert!(can_purge(DeviceLiveness::Down).is_allowed());
        assert!(!can_purge(DeviceLiveness::Up).is_allowed());
    }
}
