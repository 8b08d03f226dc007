//! Tool-call id generation (spec §4.3, §9).

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generate a 22-character base64url id, used when the provider does not
/// supply one of its own (Google never does).
pub fn generate_tool_call_id() -> String {
    let mut rng = rand::thread_rng();
    (0..22)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_22_chars_from_the_base64url_alphabet() {
        for _ in 0..50 {
            let id = generate_tool_call_id();
            assert_eq!(id.len(), 22);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn ids_are_not_trivially_repeated() {
        let a = generate_tool_call_id();
        let b = generate_tool_call_id();
        assert_ne!(a, b);
    }
}
