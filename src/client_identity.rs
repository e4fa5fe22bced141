use crate::config::NamingPolicy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use log::debug;

/// Generic words that show up in intake file names but are never part of a
/// client's name. Compared lower-cased.
const NOISE_WORDS: &[&str] = &[
    "documentos",
    "documento",
    "requerimento",
    "requerimentos",
    "procuração",
    "procuracao",
    "contrato",
    "pdf",
    "cópia",
    "copia",
    // markers added by the rotation and split stages
    "rotacionado",
    "página",
    "pagina",
];

/// Name connectors kept lower-case in full names
const CONNECTORS: &[&str] = &["de", "da", "do", "das", "dos", "e"];

/// Canonical client name plus the directory name derived from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientIdentity {
    pub display_name: String,
    pub folder_name: String,
}

/// Strip characters that are illegal in Windows/Unix file names, then trim
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|&c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Title-case word by word: a letter is upper-cased when it does not follow
/// another letter, lower-cased otherwise
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_is_letter = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            result.push(c);
            previous_is_letter = false;
        }
    }

    result
}

/// Derives a client name from an intake file name
///
/// Pure and total: every input produces an identity, falling back to the
/// title-cased raw stem when nothing usable is left after cleanup.
pub struct ClientIdentityResolver {
    policy: NamingPolicy,
    separator_regex: Regex,
    digits_regex: Regex,
}

impl ClientIdentityResolver {
    pub fn new(policy: NamingPolicy) -> Self {
        ClientIdentityResolver {
            policy,
            separator_regex: Regex::new(r"[_\-]+").expect("Invalid separator regex"),
            digits_regex: Regex::new(r"\d+").expect("Invalid digits regex"),
        }
    }

    /// Resolve from a file name or path; the extension is ignored
    pub fn resolve(&self, file_name: &str) -> ClientIdentity {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file_name);

        let display_name = match self.canonical_name(stem) {
            Some(name) => name,
            None => {
                debug!("No name tokens left in {:?}, using raw stem", stem);
                title_case(stem)
            }
        };
        let folder_name = sanitize_name(&display_name);

        ClientIdentity {
            display_name,
            folder_name,
        }
    }

    fn canonical_name(&self, stem: &str) -> Option<String> {
        let spaced = self.separator_regex.replace_all(stem, " ");

        let tokens: Vec<String> = spaced
            .split_whitespace()
            .map(|token| self.digits_regex.replace_all(token, "").to_string())
            .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|token| !token.is_empty())
            .filter(|token| !NOISE_WORDS.contains(&token.to_lowercase().as_str()))
            .collect();

        if tokens.is_empty() {
            return None;
        }

        let words: Vec<String> = match self.policy {
            NamingPolicy::Compact => tokens.iter().take(2).map(|token| title_case(token)).collect(),
            NamingPolicy::Full => tokens
                .iter()
                .enumerate()
                .map(|(index, token)| {
                    let lower = token.to_lowercase();
                    if index > 0 && CONNECTORS.contains(&lower.as_str()) {
                        lower
                    } else {
                        title_case(token)
                    }
                })
                .collect(),
        };

        Some(words.join(" "))
    }
}
