const LOVELACE_PER_ADA: f64 = 1_000_000.0;

/// Convert lovelace to ADA
pub fn lovelace_to_ada(lovelace: u64) -> f64 {
    lovelace as f64 / LOVELACE_PER_ADA
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_lovelace() {
        assert_eq!(lovelace_to_ada(2_000_000), 2.0);
        assert_eq!(lovelace_to_ada(1_500_000), 1.5);
    }
}
