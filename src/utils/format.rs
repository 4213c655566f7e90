use crate::models::{Address, TransactionId};

fn shorten(value: &str) -> String {
    let len = value.len();
    if len <= 12 {
        return value.to_string();
    }
    format!("{}...{}", &value[0..6], &value[len - 6..len])
}

/// Format a transaction id for display (shortened)
pub fn format_tx_id(id: &TransactionId) -> String {
    shorten(&id.0)
}

/// Format an address for display (shortened)
pub fn format_address(address: &Address) -> String {
    shorten(&address.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_values_are_left_alone() {
        assert_eq!(format_tx_id(&TransactionId::from("abc")), "abc");
        assert_eq!(
            format_tx_id(&TransactionId::from("0123456789abcdef0123")),
            "012345...ef0123"
        );
    }
}
