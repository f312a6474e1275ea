use artist_registry::normalize::{normalize, numbers, CanonicalKey, UNKNOWN_ARTIST};

const NAMES: &[&str] = &[
    "The Beatles",
    "Chase and Status",
    "twenty one pilots",
    "P!nk",
    "Wham!",
    "Guns N' Roses",
    "AC/DC",
    "Florence + The Machine",
    "Sigur Rós",
    "blink-182",
    "Belle and Sebastian",
    "The The",
    "A Tribe Called Quest",
    "Crosby, Stills, Nash & Young",
    "(hed) p.e.",
    "Godspeed You! Black Emperor",
    "Panic! at the Disco",
    "  ",
    "",
    "...",
    "?",
    "a-ha",
];

#[test]
fn test_normalize_is_deterministic() {
    for name in NAMES {
        assert_eq!(normalize(name), normalize(name), "{:?}", name);
    }
}

#[test]
fn test_normalize_is_idempotent() {
    for name in NAMES {
        let once = normalize(name);
        let twice = normalize(once.as_str());
        assert_eq!(twice, once, "{:?}", name);
    }
}

#[test]
fn test_keys_are_trimmed_and_collapsed() {
    for name in NAMES {
        let key = normalize(name);
        assert_eq!(key.as_str().trim(), key.as_str());
        assert!(!key.as_str().contains("  "), "{:?} -> {:?}", name, key);
    }
}

#[test]
fn test_placeholder_glyphs_share_the_unknown_key() {
    assert_eq!(normalize("?").as_str(), UNKNOWN_ARTIST);
    assert_eq!(normalize("..."), normalize("?"));
    assert!(normalize(" ? ").is_unknown());
}

#[test]
fn test_documented_examples() {
    assert_eq!(normalize("The Beatles"), normalize("beatles"));
    assert_eq!(normalize("The Beatles").as_str(), "beatles");
    assert_eq!(normalize("Chase and Status").as_str(), "chase & status");
    assert_eq!(normalize("twenty one pilots").as_str(), "21 pilots");
    assert_eq!(normalize("p!nk").as_str(), "pink");
    assert_eq!(normalize("").as_str(), "");
}

#[test]
fn test_numbers_fold_only_whole_words() {
    assert_eq!(numbers::convert("often seven"), "often 7");
    assert_eq!(numbers::convert("fourty two"), "42");
    assert_eq!(numbers::convert("ninety nine"), "99");
}

#[test]
fn test_keys_round_trip_through_json() {
    let key = normalize("Crosby, Stills, Nash & Young");
    let text = serde_json::to_string(&key).unwrap();
    assert_eq!(text, format!("\"{}\"", key.as_str()));
    let back: CanonicalKey = serde_json::from_str(&text).unwrap();
    assert_eq!(back, key);
}
