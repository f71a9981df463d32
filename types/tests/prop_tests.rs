use proptest::prelude::*;

use agora_types::{PrincipalId, ProposalId, Timestamp, TokenAmount};

proptest! {
    /// Display -> from_hex is the identity on proposal ids.
    #[test]
    fn proposal_id_hex_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let id = ProposalId::new(bytes);
        let parsed = ProposalId::from_hex(&id.to_string()).unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// Proposal ids keep their 32-byte layout through bincode (storage keys rely on it).
    #[test]
    fn proposal_id_bincode_is_raw_bytes(bytes in prop::array::uniform32(0u8..)) {
        let id = ProposalId::new(bytes);
        let encoded = bincode::serialize(&id).unwrap();
        prop_assert_eq!(encoded.as_slice(), &bytes[..]);
    }

    /// checked_add agrees with u128 arithmetic.
    #[test]
    fn amount_checked_add_matches_u128(a in any::<u128>(), b in any::<u128>()) {
        let sum = TokenAmount::new(a).checked_add(TokenAmount::new(b));
        prop_assert_eq!(sum.map(|s| s.raw()), a.checked_add(b));
    }

    /// saturating_add_secs never wraps.
    #[test]
    fn timestamp_saturating_add_is_monotonic(base in any::<u64>(), secs in any::<u64>()) {
        let t = Timestamp::new(base);
        prop_assert!(t.saturating_add_secs(secs) >= t);
    }

    /// Any whitespace-free, non-empty ascii string is a valid principal.
    #[test]
    fn principal_accepts_token_strings(s in "[A-Za-z0-9_:-]{1,64}") {
        let p = PrincipalId::parse(&s).unwrap();
        prop_assert_eq!(p.as_str(), s.as_str());
    }
}

#[test]
fn proposal_id_rejects_short_hex() {
    assert!(ProposalId::from_hex("abcd").is_err());
    assert!(ProposalId::from_hex(&"zz".repeat(32)).is_err());
}

#[test]
fn human_readable_forms_are_strings() {
    let id = ProposalId::new([0xab; 32]);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
    assert_eq!(serde_json::from_str::<ProposalId>(&json).unwrap(), id);

    let big = TokenAmount::new(u128::MAX);
    let json = serde_json::to_string(&big).unwrap();
    assert_eq!(serde_json::from_str::<TokenAmount>(&json).unwrap(), big);
    assert_eq!(serde_json::from_str::<TokenAmount>("1500").unwrap(), TokenAmount::new(1500));
    assert!(serde_json::from_str::<TokenAmount>("-1").is_err());
}

#[test]
fn amounts_are_raw_u128_in_bincode() {
    let amount = TokenAmount::new(600);
    let encoded = bincode::serialize(&amount).unwrap();
    assert_eq!(encoded, 600u128.to_le_bytes().to_vec());
    assert_eq!(bincode::deserialize::<TokenAmount>(&encoded).unwrap(), amount);
}
