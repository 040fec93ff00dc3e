use crate::{ErrorKind, Rule, Rules};

#[test]
fn presets_cover_every_rule() {
    assert!(Rules::LOOSE.is_empty());
    for rule in Rule::ALL {
        assert!(Rules::STRICT.contains(rule.flag()));
    }
    assert_eq!(Rules::STRICT, Rules::all());
}

#[test]
fn display_uses_rule_names() {
    assert_eq!(Rules::LOOSE.to_string(), "loose");
    assert_eq!(Rules::STRICT.to_string(), "strict");
    assert_eq!(
        (Rules::IN_SAFEROOT | Rules::DISALLOW_SYMLINK).to_string(),
        "disallow_symlink | in_saferoot"
    );
}

#[test]
fn parse_accepts_names_and_separators() {
    let parsed: Rules = "in_saferoot | disallow_symlink".parse().unwrap();
    assert_eq!(parsed, Rules::IN_SAFEROOT | Rules::DISALLOW_SYMLINK);
    let parsed: Rules = "IN_ALLOWED_ROOTS,in_saferoot".parse().unwrap();
    assert_eq!(parsed, Rules::IN_ALLOWED_ROOTS | Rules::IN_SAFEROOT);
    assert_eq!("strict".parse::<Rules>().unwrap(), Rules::STRICT);
    assert_eq!("loose".parse::<Rules>().unwrap(), Rules::LOOSE);
    assert_eq!("".parse::<Rules>().unwrap(), Rules::LOOSE);
}

#[test]
fn parse_round_trips_display() {
    for bits in 0..=Rules::STRICT.bits() {
        let rules = Rules::from_bits_truncate(bits);
        assert_eq!(rules.to_string().parse::<Rules>().unwrap(), rules);
    }
}

#[test]
fn parse_rejects_unknown_names() {
    let err = "in_saferoot | chroot".parse::<Rules>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert!(err.to_string().contains("chroot"));
}

#[cfg(feature = "serde")]
#[test]
fn serde_uses_display_form() {
    let json = serde_json::to_string(&(Rules::IN_SAFEROOT | Rules::IN_ALLOWED_ROOTS)).unwrap();
    assert_eq!(json, "\"in_allowed_roots | in_saferoot\"");
    let back: Rules = serde_json::from_str("\"strict\"").unwrap();
    assert_eq!(back, Rules::STRICT);
    assert!(serde_json::from_str::<Rules>("\"nope\"").is_err());
}
