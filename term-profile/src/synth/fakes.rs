//! Realistically shaped fake values.
//!
//! Nothing here reads profiled values. Every generator draws from the fixed
//! word lists below and the caller's RNG, which keeps masked columns free of
//! real records and keeps output reproducible for a fixed seed.

use rand::seq::IndexedRandom;
use rand::Rng;
use uuid::Uuid;

use crate::profile::inference::is_person_name;
use crate::profile::types::TextPattern;

const FIRST_NAMES: &[&str] = &[
    "Alex", "Maria", "James", "Priya", "Chen", "Fatima", "Lucas", "Amara", "Noah", "Sofia",
    "Kenji", "Olga", "Mateo", "Leila", "Samuel", "Ines", "Tomas", "Yara", "Daniel", "Hana",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Garcia", "Nguyen", "Patel", "Kowalski", "Okafor", "Silva", "Muller", "Tanaka",
    "Johansson", "Rossi", "Haddad", "Novak", "Brown", "Dubois", "Ivanova", "Kim", "Moreau",
];

const CITIES: &[&str] = &[
    "Springfield", "Riverton", "Lakeside", "Fairview", "Greenville", "Milford", "Oakridge",
    "Bridgeport", "Ashland", "Kingston", "Clayton", "Madison",
];

const COUNTRIES: &[&str] = &[
    "Atlantis", "Borduria", "Elbonia", "Freedonia", "Genovia", "Latveria", "Ruritania",
    "Syldavia", "Wakanda", "Zamunda",
];

const DEPARTMENTS: &[&str] = &[
    "Engineering", "Finance", "Marketing", "Operations", "Sales", "Support", "Legal",
    "Research", "Logistics", "Human Resources",
];

const STREETS: &[&str] = &[
    "Main St", "Oak Ave", "Maple Rd", "Cedar Ln", "Park Blvd", "Hill St", "Lake Dr", "Pine Ct",
];

const COMPANY_SUFFIXES: &[&str] = &["Ltd", "Inc", "Group", "Labs", "Partners", "Systems"];

const TITLE_WORDS: &[&str] = &[
    "Annual", "Quarterly", "Strategic", "Global", "Advanced", "Practical", "Modern", "Report",
    "Review", "Overview", "Guide", "Plan", "Analysis", "Update", "Summary",
];

const WORDS: &[&str] = &[
    "data", "value", "system", "order", "account", "river", "light", "stone", "market", "signal",
    "green", "quick", "table", "window", "paper", "north", "metal", "cloud", "garden", "simple",
    "review", "record", "number", "open", "field", "process", "travel", "basic", "common", "level",
];

const DOMAINS: &[&str] = &["example.com", "example.org", "example.net", "mail.test"];

const TLDS: &[&str] = &["com", "org", "net", "io"];

/// Generator family chosen from a column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameHint {
    PersonName,
    Email,
    Phone,
    Address,
    City,
    Country,
    Department,
    Company,
    Title,
    /// Account numbers, national ids and similar digit strings.
    Identifier,
}

impl NameHint {
    /// Picks a family from name fragments, first match wins.
    pub fn from_column(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
        if has(&["email", "e_mail"]) {
            Some(Self::Email)
        } else if has(&["phone", "mobile", "fax"]) {
            Some(Self::Phone)
        } else if is_person_name(name) {
            Some(Self::PersonName)
        } else if has(&["address", "street"]) {
            Some(Self::Address)
        } else if has(&["city", "town"]) {
            Some(Self::City)
        } else if has(&["country", "nation"]) {
            Some(Self::Country)
        } else if has(&["department", "dept", "team", "division"]) {
            Some(Self::Department)
        } else if has(&["company", "employer", "vendor", "supplier", "organization"]) {
            Some(Self::Company)
        } else if has(&["title", "subject", "headline"]) {
            Some(Self::Title)
        } else if has(&[
            "ssn", "social_security", "passport", "iban", "tax_id", "card_number", "account_number",
        ]) {
            Some(Self::Identifier)
        } else {
            None
        }
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, list: &[&'static str]) -> &'static str {
    list.choose(rng).copied().unwrap_or_default()
}

fn digits<R: Rng + ?Sized>(rng: &mut R, n: usize) -> String {
    (0..n)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// A random version 4 UUID built from RNG bytes.
pub fn fake_uuid<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    let bytes: [u8; 16] = rng.random();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

pub fn fake_person_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

fn fake_email<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}.{}{}@{}",
        pick(rng, FIRST_NAMES).to_ascii_lowercase(),
        pick(rng, LAST_NAMES).to_ascii_lowercase(),
        rng.random_range(1..100u32),
        pick(rng, DOMAINS)
    )
}

fn fake_phone<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "+1-555-{}-{}",
        digits(rng, 3),
        digits(rng, 4)
    )
}

/// Luhn-valid 16 digit number with a test-range prefix.
fn fake_credit_card<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut number: Vec<u32> = vec![4, 0, 0, 0];
    number.extend((0..11).map(|_| rng.random_range(0..10u32)));
    let sum: u32 = number
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                *d
            }
        })
        .sum();
    number.push((10 - sum % 10) % 10);
    let text: String = number.iter().map(|d| char::from(b'0' + *d as u8)).collect();
    format!(
        "{}-{}-{}-{}",
        &text[0..4],
        &text[4..8],
        &text[8..12],
        &text[12..16]
    )
}

/// A value shaped like `pattern`.
pub fn fake_for_pattern<R: Rng + ?Sized>(rng: &mut R, pattern: TextPattern) -> String {
    match pattern {
        TextPattern::Email => fake_email(rng),
        TextPattern::Url => format!(
            "https://www.{}{}.{}/{}",
            pick(rng, WORDS),
            pick(rng, WORDS),
            pick(rng, TLDS),
            pick(rng, WORDS)
        ),
        TextPattern::Phone => fake_phone(rng),
        TextPattern::Uuid => fake_uuid(rng).to_string(),
        TextPattern::IpAddress => format!(
            "10.{}.{}.{}",
            rng.random_range(0..=255u8),
            rng.random_range(0..=255u8),
            rng.random_range(1..=254u8)
        ),
        TextPattern::CreditCard => fake_credit_card(rng),
        TextPattern::PostalCode => digits(rng, 5),
        TextPattern::Date => format!(
            "{}-{:02}-{:02}",
            rng.random_range(2000..=2030u32),
            rng.random_range(1..=12u32),
            rng.random_range(1..=28u32)
        ),
        TextPattern::Currency => format!(
            "${}.{:02}",
            rng.random_range(1..10_000u32),
            rng.random_range(0..100u32)
        ),
        TextPattern::Percentage => format!("{:.1}%", rng.random::<f64>() * 100.0),
    }
}

/// A value of the family `hint`.
pub fn fake_for_hint<R: Rng + ?Sized>(rng: &mut R, hint: NameHint) -> String {
    match hint {
        NameHint::PersonName => fake_person_name(rng),
        NameHint::Email => fake_email(rng),
        NameHint::Phone => fake_phone(rng),
        NameHint::Address => format!(
            "{} {}",
            rng.random_range(1..2000u32),
            pick(rng, STREETS)
        ),
        NameHint::City => pick(rng, CITIES).to_string(),
        NameHint::Country => pick(rng, COUNTRIES).to_string(),
        NameHint::Department => pick(rng, DEPARTMENTS).to_string(),
        NameHint::Company => format!("{} {}", pick(rng, LAST_NAMES), pick(rng, COMPANY_SUFFIXES)),
        NameHint::Title => {
            let words = rng.random_range(2..=4usize);
            (0..words)
                .map(|_| pick(rng, TITLE_WORDS))
                .collect::<Vec<_>>()
                .join(" ")
        }
        NameHint::Identifier => format!("XX{}", digits(rng, 9)),
    }
}

/// Sentence-like text of exactly `len` characters.
pub fn pseudo_text<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut text = String::with_capacity(len + 12);
    while text.len() < len {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(pick(rng, WORDS));
    }
    text.truncate(len);
    let trimmed = text.trim_end().len();
    if trimmed < text.len() && trimmed > 0 {
        // Avoid a trailing space by padding with a letter.
        text.truncate(trimmed);
        text.push('s');
    }
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::patterns::matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pattern_fakes_match_their_detectors() {
        let mut rng = StdRng::seed_from_u64(21);
        for pattern in TextPattern::ALL {
            for _ in 0..20 {
                let value = fake_for_pattern(&mut rng, pattern);
                assert!(
                    matches(pattern, &value),
                    "{value:?} does not look like {pattern:?}"
                );
            }
        }
    }

    #[test]
    fn test_name_hints() {
        assert_eq!(NameHint::from_column("customer_email"), Some(NameHint::Email));
        assert_eq!(NameHint::from_column("first_name"), Some(NameHint::PersonName));
        assert_eq!(NameHint::from_column("home_city"), Some(NameHint::City));
        assert_eq!(NameHint::from_column("Department"), Some(NameHint::Department));
        assert_eq!(NameHint::from_column("ssn"), Some(NameHint::Identifier));
        assert_eq!(NameHint::from_column("amount"), None);
    }

    #[test]
    fn test_pseudo_text_length() {
        let mut rng = StdRng::seed_from_u64(1);
        for len in [0, 1, 5, 17, 80] {
            let text = pseudo_text(&mut rng, len);
            assert_eq!(text.len(), len);
            assert!(!text.ends_with(' '));
        }
    }

    #[test]
    fn test_uuid_is_deterministic_v4() {
        let a = fake_uuid(&mut StdRng::seed_from_u64(7));
        let b = fake_uuid(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }
}
