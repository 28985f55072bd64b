use std::fmt::Display;

/// Code prefixes meaning the operation is voided, cancelled or on hold. Nothing financial may happen for these.
pub const BLOCKED_PREFIXES: [&str; 4] = ["VX/", "VN/", "VA/", "HR/"];
/// Code prefix meaning Infortisa expects to be paid.
pub const PAYABLE_PREFIX: &str = "VR/";

/// The interpretation of an Infortisa operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Blocked,
    Payable,
    Pending,
}

impl LifecycleState {
    pub fn from_op_code(code: &str) -> Self {
        let code = code.trim();
        if BLOCKED_PREFIXES.iter().any(|p| code.starts_with(p)) {
            LifecycleState::Blocked
        } else if code.starts_with(PAYABLE_PREFIX) {
            LifecycleState::Payable
        } else {
            LifecycleState::Pending
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, LifecycleState::Blocked)
    }
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Blocked => write!(f, "Blocked"),
            LifecycleState::Payable => write!(f, "Payable"),
            LifecycleState::Pending => write!(f, "Pending"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prefixes() {
        assert_eq!(LifecycleState::from_op_code("VR/2024/0001"), LifecycleState::Payable);
        for code in ["VX/1", "VN/1", "VA/1", "HR/1"] {
            assert!(LifecycleState::from_op_code(code).is_blocked(), "{code}");
        }
        assert_eq!(LifecycleState::from_op_code(""), LifecycleState::Pending);
        assert_eq!(LifecycleState::from_op_code("PR/77"), LifecycleState::Pending);
        assert_eq!(LifecycleState::from_op_code("VR"), LifecycleState::Pending);
        assert_eq!(LifecycleState::from_op_code(" VR/1 "), LifecycleState::Payable);
    }
}
