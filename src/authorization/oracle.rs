//! Policy Oracle interface (§6): a single `Eval(ctx, input) -> {allowed: bool}` method
//! over a small key-value document. The oracle is prepared once at startup (loading
//! `OPA_MODULE_FILE`, outside this crate) and is otherwise stateless — this crate only
//! owns the trait, the input shape assembled by [`super::decision::OracleEngine`], and a
//! `NullOracle` test double.

use serde_derive::Serialize;

use crate::store::CancellationToken;
use crate::error::Error;

/// One entry of `OracleInput::user_roles`: a role the querying user holds, stripped down
/// to the fields the oracle needs to make its decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleUserRole {
    pub object_id: u64,
    pub action_flags: u8,
}

/// The context document handed to the oracle for one `AuthQuery` (§4.5 Shape B).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleInput {
    pub user_id: u64,
    pub object_id: u64,
    pub action_flag: u8,
    pub user_roles: Vec<OracleUserRole>,
}

/// Must be safe for concurrent evaluation; the core holds no locks across this call (§5).
pub trait PolicyOracle {
    fn eval(&self, input: &OracleInput, cancel: &CancellationToken) -> Result<bool, Error>;
}

/// Test double standing in for a real OPA process: always returns a fixed verdict.
pub struct NullOracle {
    pub allow: bool,
}

impl NullOracle {
    pub fn allow_all() -> Self {
        NullOracle { allow: true }
    }

    pub fn deny_all() -> Self {
        NullOracle { allow: false }
    }
}

impl PolicyOracle for NullOracle {
    fn eval(&self, _input: &OracleInput, cancel: &CancellationToken) -> Result<bool, Error> {
        cancel.check()?;
        Ok(self.allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_oracle_returns_fixed_verdict() {
        let cancel = CancellationToken::new();
        let input = OracleInput { user_id: 1, object_id: 2, action_flag: 1, user_roles: vec![] };

        assert!(NullOracle::allow_all().eval(&input, &cancel).unwrap());
        assert!(!NullOracle::deny_all().eval(&input, &cancel).unwrap());
    }
}
