//! Economy pool bootstrap configuration from environment variables.

use crate::error::EconomyError;

/// Defaults and clamps for the pool row created on first start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EconomyConfig {
    /// Initial reserve-side balance.
    pub init_reserve: i64,
    /// Initial $ARENA-side balance.
    pub init_arena: i64,
    /// Swap fee in basis points.
    pub fee_bps: u32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            init_reserve: 10_000,
            init_arena: 10_000,
            fee_bps: 100,
        }
    }
}

impl EconomyConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional variables, with defaults and clamps:
    /// - `ECONOMY_INIT_RESERVE` -- default 10000, clamped to `>= 1000`
    /// - `ECONOMY_INIT_ARENA` -- default 10000, clamped to `>= 0`
    /// - `ECONOMY_FEE_BPS` -- default 100, clamped to `0..=1000`
    pub fn from_env() -> Result<Self, EconomyError> {
        let init_reserve: i64 = optional_var("ECONOMY_INIT_RESERVE", 10_000)?;
        let init_arena: i64 = optional_var("ECONOMY_INIT_ARENA", 10_000)?;
        let fee_bps: u32 = optional_var("ECONOMY_FEE_BPS", 100)?;

        Ok(Self {
            init_reserve: init_reserve.max(1_000),
            init_arena: init_arena.max(0),
            fee_bps: fee_bps.min(1_000),
        })
    }
}

/// Read an optional environment variable with a default, surfacing parse
/// failures as typed config errors.
fn optional_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, EconomyError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|e| EconomyError::Config {
            message: format!("invalid {name}: {e}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        let config = EconomyConfig::default();
        assert_eq!(config.init_reserve, 10_000);
        assert_eq!(config.init_arena, 10_000);
        assert_eq!(config.fee_bps, 100);
    }

    #[test]
    fn clamps_apply() {
        // Exercise the clamp logic directly; env vars are process-global
        // and tests must not race on them.
        let config = EconomyConfig {
            init_reserve: 10_i64.max(1_000),
            init_arena: (-5_i64).max(0),
            fee_bps: 5_000_u32.min(1_000),
        };
        assert_eq!(config.init_reserve, 1_000);
        assert_eq!(config.init_arena, 0);
        assert_eq!(config.fee_bps, 1_000);
    }
}
