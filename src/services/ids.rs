use chrono::Utc;
use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Human-facing booking reference: `VT<base36 millis><4 random>`.
pub fn booking_reference() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!("VT{}{}", to_base36(millis), random_base36(4))
}

/// Gateway transaction id: `TXN<epoch millis><7 random>`.
pub fn transaction_id() -> String {
    format!("TXN{}{}", Utc::now().timestamp_millis(), random_base36(7))
}

pub fn booking_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "LOYW3V28");
    }

    #[test]
    fn test_booking_reference_format() {
        let reference = booking_reference();
        assert!(reference.starts_with("VT"));
        // 8 base36 digits cover millisecond timestamps until 2059
        assert_eq!(reference.len(), 2 + 8 + 4);
        assert!(reference[2..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_transaction_id_format() {
        let txn = transaction_id();
        assert!(txn.starts_with("TXN"));
        let (millis, suffix) = txn[3..].split_at(txn.len() - 3 - 7);
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 7);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
