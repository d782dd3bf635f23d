use crate::error::{Error, Result};
use crate::models::{Civility, Person, PersonStatus, RawFragment, field};
use crate::utils::{fold, non_empty, normalize_text, title_case};
use chrono::NaiveDate;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Civility label or abbreviation → enum. Anything unlisted is `Unknown`:
/// the site's vocabulary grows without notice.
pub fn parse_civility(s: &str) -> Civility {
    match fold(s).trim_end_matches('.') {
        "m" | "mr" | "monsieur" => Civility::Monsieur,
        "mme" | "madame" | "mlle" | "mademoiselle" => Civility::Madame,
        "mgr" | "monseigneur" => Civility::Monseigneur,
        "p" | "pere" => Civility::Pere,
        "sr" | "soeur" | "sœur" => Civility::Soeur,
        "fr" | "frere" => Civility::Frere,
        _ => Civility::Unknown,
    }
}

/// Whether a leading name token is a civility rather than part of the name.
/// Only short dotted abbreviations ("M.", "Mme.", "Dr.") qualify: FRERE or
/// PERE at the head of a display name is a surname.
fn is_title_token(token: &str) -> bool {
    token.ends_with('.')
        && token.chars().count() <= 5
        && token.chars().next().is_some_and(char::is_alphabetic)
}

/// Intranet registration label → status, by keyword like the site's own wording
/// ("Pré-inscrit", "Inscrit", "Adhérent", "Invité", "A quitté l'association", "Décédé").
pub fn parse_status(s: &str) -> PersonStatus {
    let s = fold(s);
    if s.contains("pr") && s.contains("inscrit") {
        PersonStatus::Preinscrit
    } else if s.contains("inscrit") {
        PersonStatus::Inscrit
    } else if s.contains("adh") {
        PersonStatus::Adherent
    } else if s.contains("inv") {
        PersonStatus::Invite
    } else if s.contains("quitt") {
        PersonStatus::AQuitteLAssociation
    } else if s.contains("ced") {
        PersonStatus::Decede
    } else {
        PersonStatus::Unknown
    }
}

/// Day-first dates as printed by the intranet, ISO as fallback.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Pieces of a displayed name such as `M. DUPONT Jean (MARTIN)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameParts {
    pub civility: Civility,
    pub last_name: String,
    pub first_name: String,
    pub birth_name: Option<String>,
}

/// Split a display name: optional leading civility, trailing parenthesised
/// birth name, then last name = every word but the last, first name = last word.
pub fn split_full_name(s: &str) -> NameParts {
    let mut parts = NameParts {
        civility: Civility::Unknown,
        last_name: String::new(),
        first_name: String::new(),
        birth_name: None,
    };

    let s = normalize_text(s);
    if s.is_empty() || s == "(Sans nom)" {
        return parts;
    }

    let (name, birth) = match (s.find('('), s.rfind(')')) {
        (Some(open), Some(close)) if open < close => (&s[..open], non_empty(&s[open + 1..close])),
        _ => (s.as_str(), None),
    };
    parts.birth_name = birth;

    let mut words: Vec<&str> = name.split_whitespace().collect();
    if words.len() > 1 && is_title_token(words[0]) {
        parts.civility = parse_civility(words.remove(0));
    }

    match words.len() {
        0 => {}
        1 => parts.last_name = words[0].to_string(),
        n => {
            parts.last_name = words[..n - 1].join(" ");
            parts.first_name = words[n - 1].to_string();
        }
    }
    parts
}

// ── Fragment → Person ─────────────────────────────────────────────────────────

/// Deterministic: the same fragment always yields the same `Person`.
pub fn map(fragment: &RawFragment) -> Result<Person> {
    let iid = fragment
        .get(field::IID)
        .and_then(non_empty)
        .ok_or_else(|| {
            Error::Validation(format!("fragment without {}: {:?}", field::IID, fragment))
        })?;

    let name = split_full_name(fragment.get(field::FULL_NAME).unwrap_or(""));

    Ok(Person {
        iid,
        code: fragment.get(field::CODE).and_then(non_empty),
        civility: name.civility,
        first_name: title_case(&name.first_name),
        last_name: title_case(&name.last_name),
        birth_name: name.birth_name.as_deref().map(title_case),
        status: fragment.get(field::STATUS).map(parse_status),
        group: fragment.get(field::GROUP).and_then(non_empty),
        function: fragment.get(field::FUNCTION).and_then(non_empty),
        function_start: fragment.get(field::FUNCTION_START).and_then(parse_date),
        function_end: fragment.get(field::FUNCTION_END).and_then(parse_date),
        postcode: fragment.get(field::POSTCODE).and_then(non_empty),
        city: fragment.get(field::CITY).and_then(non_empty),
        membership_end: fragment.get(field::MEMBERSHIP_END).and_then(parse_date),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
