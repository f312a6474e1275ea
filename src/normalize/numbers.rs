//! Folding of spelled-out numbers ("twenty one") into digits ("21").

use once_cell::sync::Lazy;
use regex::Regex;

/// Phrases tried in order. Compounds precede the tens words they start with,
/// which precede the teens and ones, so "twenty one" is never consumed as
/// "twenty" followed by a literal "one".
pub const SPELLED_NUMBERS: [(&str, &str); 109] = [
    // two-word compounds
    ("twenty one", "21"), ("twenty two", "22"), ("twenty three", "23"),
    ("twenty four", "24"), ("twenty five", "25"), ("twenty six", "26"),
    ("twenty seven", "27"), ("twenty eight", "28"), ("twenty nine", "29"),
    ("thirty one", "31"), ("thirty two", "32"), ("thirty three", "33"),
    ("thirty four", "34"), ("thirty five", "35"), ("thirty six", "36"),
    ("thirty seven", "37"), ("thirty eight", "38"), ("thirty nine", "39"),
    ("forty one", "41"), ("forty two", "42"), ("forty three", "43"),
    ("forty four", "44"), ("forty five", "45"), ("forty six", "46"),
    ("forty seven", "47"), ("forty eight", "48"), ("forty nine", "49"),
    ("fourty one", "41"), ("fourty two", "42"), ("fourty three", "43"),
    ("fourty four", "44"), ("fourty five", "45"), ("fourty six", "46"),
    ("fourty seven", "47"), ("fourty eight", "48"), ("fourty nine", "49"),
    ("fifty one", "51"), ("fifty two", "52"), ("fifty three", "53"),
    ("fifty four", "54"), ("fifty five", "55"), ("fifty six", "56"),
    ("fifty seven", "57"), ("fifty eight", "58"), ("fifty nine", "59"),
    ("sixty one", "61"), ("sixty two", "62"), ("sixty three", "63"),
    ("sixty four", "64"), ("sixty five", "65"), ("sixty six", "66"),
    ("sixty seven", "67"), ("sixty eight", "68"), ("sixty nine", "69"),
    ("seventy one", "71"), ("seventy two", "72"), ("seventy three", "73"),
    ("seventy four", "74"), ("seventy five", "75"), ("seventy six", "76"),
    ("seventy seven", "77"), ("seventy eight", "78"), ("seventy nine", "79"),
    ("eighty one", "81"), ("eighty two", "82"), ("eighty three", "83"),
    ("eighty four", "84"), ("eighty five", "85"), ("eighty six", "86"),
    ("eighty seven", "87"), ("eighty eight", "88"), ("eighty nine", "89"),
    ("ninety one", "91"), ("ninety two", "92"), ("ninety three", "93"),
    ("ninety four", "94"), ("ninety five", "95"), ("ninety six", "96"),
    ("ninety seven", "97"), ("ninety eight", "98"), ("ninety nine", "99"),
    // tens
    ("twenty", "20"), ("thirty", "30"), ("forty", "40"), ("fourty", "40"), ("fifty", "50"),
    ("sixty", "60"), ("seventy", "70"), ("eighty", "80"), ("ninety", "90"),
    // teens
    ("ten", "10"), ("eleven", "11"), ("twelve", "12"), ("thirteen", "13"), ("fourteen", "14"),
    ("fifteen", "15"), ("sixteen", "16"), ("seventeen", "17"), ("eighteen", "18"), ("nineteen", "19"),
    // ones
    ("one", "1"), ("two", "2"), ("three", "3"), ("four", "4"), ("five", "5"),
    ("six", "6"), ("seven", "7"), ("eight", "8"), ("nine", "9"),
];

static PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    SPELLED_NUMBERS
        .iter()
        .map(|(phrase, digits)| {
            let pattern = format!(r"\b{}\b", regex::escape(phrase));
            // Patterns come from the constant table above
            (Regex::new(&pattern).expect("spelled number pattern"), *digits)
        })
        .collect()
});

/// Replaces every whole-word spelled-out integer from one to ninety-nine
/// with its digits. Expects lowercased input.
pub fn convert(text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, digits) in PATTERNS.iter() {
        if pattern.is_match(&out) {
            out = pattern.replace_all(&out, *digits).into_owned();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(phrase: &str) -> usize {
        SPELLED_NUMBERS
            .iter()
            .position(|(p, _)| *p == phrase)
            .unwrap_or_else(|| panic!("{} missing from table", phrase))
    }

    #[test]
    fn test_compounds_precede_their_parts() {
        for (phrase, _) in SPELLED_NUMBERS.iter().filter(|(p, _)| p.contains(' ')) {
            let (tens, ones) = phrase.split_once(' ').unwrap();
            assert!(position(phrase) < position(tens), "{} after {}", phrase, tens);
            assert!(position(phrase) < position(ones), "{} after {}", phrase, ones);
        }
    }

    #[test]
    fn test_tens_precede_teens_and_ones() {
        assert!(position("twenty") < position("ten"));
        assert!(position("ninety") < position("nineteen"));
        assert!(position("nineteen") < position("nine"));
        assert!(position("seventeen") < position("seven"));
    }

    #[test]
    fn test_table_values_match_phrases() {
        assert_eq!(SPELLED_NUMBERS.len(), 109);
        let lookup = |p: &str| SPELLED_NUMBERS[position(p)].1;
        assert_eq!(lookup("twenty one"), "21");
        assert_eq!(lookup("fourty two"), "42");
        assert_eq!(lookup("forty two"), "42");
        assert_eq!(lookup("ninety nine"), "99");
        assert_eq!(lookup("eleven"), "11");
    }

    #[test]
    fn test_convert_compound() {
        assert_eq!(convert("twenty one pilots"), "21 pilots");
        assert_eq!(convert("blink one eighty two"), "blink 1 82");
    }

    #[test]
    fn test_convert_single_words() {
        assert_eq!(convert("maroon five"), "maroon 5");
        assert_eq!(convert("the seventeen"), "the 17");
        assert_eq!(convert("thirty seconds"), "30 seconds");
    }

    #[test]
    fn test_convert_respects_word_boundaries() {
        assert_eq!(convert("often"), "often");
        assert_eq!(convert("someone"), "someone");
        assert_eq!(convert("tension"), "tension");
        assert_eq!(convert("tone eighteen"), "tone 18");
    }

    #[test]
    fn test_convert_is_case_sensitive() {
        assert_eq!(convert("Twenty One"), "Twenty One");
    }

    #[test]
    fn test_convert_leaves_large_numbers_alone() {
        assert_eq!(convert("one hundred"), "1 hundred");
        assert_eq!(convert(""), "");
    }
}
