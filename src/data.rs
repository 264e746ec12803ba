//! Test data generation.
//!
//! Units query this for realistic valid and invalid inputs. The engine
//! itself never calls it. Output is deterministic for a given seed so
//! repeated runs send the same payloads.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_SEED: u64 = 42;

const FIRST_NAMES: &[&str] = &[
    "Ava", "Liam", "Noah", "Mia", "Ethan", "Zoe", "Lucas", "Aria", "Omar", "Hana",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Garcia", "Okafor", "Nguyen", "Kowalski", "Haddad", "Larsen", "Moreau",
];
const DOMAINS: &[&str] = &["example.com", "example.org", "test.dev"];
const WORDS: &[&str] = &[
    "quick", "report", "order", "account", "delivery", "support", "invoice", "profile",
    "update", "question",
];
const PASSWORD_SYMBOLS: &[u8] = b"!@#$%^&*";

/// Registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub phone: String,
}

/// Login payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Kind of form payload to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Contact,
    Feedback,
}

/// Deterministic value source shared by the units of a run.
pub struct DataGenerator {
    rng: Mutex<StdRng>,
}

impl Default for DataGenerator {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}

impl DataGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn below(&self, bound: usize) -> usize {
        self.rng().random_range(0..bound)
    }

    fn pick<'a>(&self, items: &[&'a str]) -> &'a str {
        items.choose(&mut *self.rng()).copied().unwrap_or_default()
    }

    fn digits(&self, count: usize) -> String {
        let mut rng = self.rng();
        (0..count)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect()
    }

    /// Password with upper, lower, digit and symbol characters.
    pub fn strong_password(&self) -> String {
        let mut password = String::with_capacity(12);
        for i in 0..12 {
            let c = match i % 4 {
                0 => char::from(b'A' + self.below(26) as u8),
                1 => char::from(b'a' + self.below(26) as u8),
                2 => char::from(b'0' + self.below(10) as u8),
                _ => char::from(
                    PASSWORD_SYMBOLS
                        .choose(&mut *self.rng())
                        .copied()
                        .unwrap_or(b'!'),
                ),
            };
            password.push(c);
        }
        password
    }

    pub fn user_data(&self, valid: bool) -> UserData {
        let first = self.pick(FIRST_NAMES);
        let last = self.pick(LAST_NAMES);
        if valid {
            let username = format!("{}.{}{}", first, last, self.digits(3)).to_lowercase();
            UserData {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: format!("{}@{}", username, self.pick(DOMAINS)),
                username,
                password: self.strong_password(),
                phone: format!("+1-555-{}-{}", self.digits(3), self.digits(4)),
            }
        } else {
            UserData {
                first_name: String::new(),
                last_name: last.to_string(),
                email: "invalid-email".to_string(),
                username: String::new(),
                password: "123".to_string(),
                phone: "invalid-phone".to_string(),
            }
        }
    }

    pub fn login_data(&self, valid: bool) -> Credentials {
        if valid {
            let user = self.user_data(true);
            Credentials {
                username: user.username,
                email: user.email,
                password: user.password,
            }
        } else {
            Credentials {
                username: "nonexistent_user".to_string(),
                email: "invalid@email".to_string(),
                password: "wrong_password".to_string(),
            }
        }
    }

    pub fn form_data(&self, kind: FormKind, valid: bool) -> BTreeMap<String, String> {
        let fields: Vec<(&str, String)> = match (kind, valid) {
            (FormKind::Contact, true) => {
                let user = self.user_data(true);
                vec![
                    ("name", format!("{} {}", user.first_name, user.last_name)),
                    ("email", user.email),
                    ("subject", self.sentence(3)),
                    ("message", self.sentence(20)),
                    ("phone", user.phone),
                ]
            }
            (FormKind::Contact, false) => vec![
                ("name", String::new()),
                ("email", "invalid-email".to_string()),
                ("subject", String::new()),
                ("message", String::new()),
                ("phone", "invalid-phone".to_string()),
            ],
            (FormKind::Feedback, true) => vec![
                ("rating", (1 + self.below(5)).to_string()),
                ("comment", self.sentence(30)),
                (
                    "category",
                    self.pick(&["Bug Report", "Feature Request", "General Feedback"])
                        .to_string(),
                ),
            ],
            (FormKind::Feedback, false) => vec![
                ("rating", "invalid-rating".to_string()),
                ("comment", String::new()),
                ("category", "Invalid Category".to_string()),
            ],
        };

        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Boundary inputs: oversized, empty, unicode and injection strings.
    pub fn edge_cases(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("very_long_text", "A".repeat(1000)),
            ("special_chars", "!@#$%^&*()_+-=[]{}|;:,.<>?".to_string()),
            ("unicode_text", "测试文本 🚀 ñáéíóú".to_string()),
            ("sql_injection", "'; DROP TABLE users; --".to_string()),
            ("xss_attempt", "<script>alert(\"XSS\")</script>".to_string()),
            (
                "very_long_email",
                format!("{}@{}.com", "a".repeat(50), "b".repeat(50)),
            ),
            ("empty_string", String::new()),
            ("whitespace_only", "   ".to_string()),
        ])
    }

    pub fn sql_injection_payloads(&self) -> Vec<&'static str> {
        vec![
            "'; DROP TABLE users; --",
            "' OR '1'='1",
            "' OR 1=1 --",
            "admin'--",
            "' UNION SELECT * FROM users --",
        ]
    }

    pub fn xss_payloads(&self) -> Vec<&'static str> {
        vec![
            "<script>alert(\"XSS\")</script>",
            "<img src=\"x\" onerror=\"alert('XSS')\">",
            "<svg onload=\"alert('XSS')\">",
            "javascript:alert(\"XSS\")",
        ]
    }

    fn sentence(&self, words: usize) -> String {
        let text: Vec<&str> = (0..words.max(1)).map(|_| self.pick(WORDS)).collect();
        let mut sentence = text.join(" ");
        if let Some(c) = sentence.get(0..1) {
            let upper = c.to_uppercase();
            sentence.replace_range(0..1, &upper);
        }
        sentence.push('.');
        sentence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_data() {
        let a = DataGenerator::with_seed(7);
        let b = DataGenerator::with_seed(7);
        assert_eq!(a.user_data(true), b.user_data(true));
        assert_eq!(a.login_data(true), b.login_data(true));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let a = DataGenerator::with_seed(1);
        let b = DataGenerator::with_seed(2);
        let first: Vec<String> = (0..5).map(|_| a.strong_password()).collect();
        let second: Vec<String> = (0..5).map(|_| b.strong_password()).collect();
        assert_ne!(first, second);
    }

    #[test]
    fn test_sequence_repeats_per_seed() {
        let run = |seed| {
            let gen = DataGenerator::with_seed(seed);
            (0..3)
                .map(|_| gen.form_data(FormKind::Feedback, true))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(99), run(99));
    }

    #[test]
    fn test_valid_user_data_shape() {
        let user = DataGenerator::new().user_data(true);
        assert!(user.email.contains('@'));
        assert!(!user.username.is_empty());
        assert_eq!(user.password.len(), 12);
        assert!(user.password.chars().any(|c| c.is_ascii_uppercase()));
        assert!(user.password.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_invalid_user_data_is_invalid() {
        let user = DataGenerator::new().user_data(false);
        assert!(user.first_name.is_empty());
        assert!(!user.email.contains('@'));
        assert_eq!(user.password, "123");
    }

    #[test]
    fn test_invalid_login_is_fixed() {
        let creds = DataGenerator::new().login_data(false);
        assert_eq!(creds.username, "nonexistent_user");
    }

    #[test]
    fn test_form_data_fields() {
        let gen = DataGenerator::new();
        let contact = gen.form_data(FormKind::Contact, true);
        assert!(contact.contains_key("message"));
        assert!(contact["message"].ends_with('.'));

        let feedback = gen.form_data(FormKind::Feedback, true);
        let rating: usize = feedback["rating"].parse().unwrap();
        assert!((1..=5).contains(&rating));
    }

    #[test]
    fn test_edge_cases_include_injection() {
        let cases = DataGenerator::new().edge_cases();
        assert_eq!(cases["very_long_text"].len(), 1000);
        assert!(cases["sql_injection"].contains("DROP TABLE"));
    }
}
