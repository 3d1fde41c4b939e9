//! Name matching rules
//!
//! Face recognition output rarely matches a query name byte for byte. The
//! ordered rules here decide whether a detection names the same person as an
//! investigation target, and deduplicate bridge candidates. All comparisons
//! run on normalised names.

use crate::normalise::normalise_name;

/// Static alias table mapping stage names and nicknames to canonical names.
///
/// Both directions are consulted; entries are stored normalised.
const ALIASES: &[(&str, &str)] = &[
    ("ye", "kanye west"),
    ("the rock", "dwayne johnson"),
    ("jlo", "jennifer lopez"),
    ("j lo", "jennifer lopez"),
    ("king james", "lebron james"),
    ("a rod", "alex rodriguez"),
    ("the weeknd", "abel tesfaye"),
    ("lady gaga", "stefani germanotta"),
    ("snoop dogg", "calvin broadus"),
    ("rihanna", "robyn fenty"),
];

/// Which rule produced a positive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Exact normalised equality
    Exact,
    /// Alias table lookup
    Alias,
    /// Two-token names in reversed order
    Reversed,
    /// Every word of the shorter name appears whole in the longer
    WordSubset,
    /// First and last tokens both equal
    FirstAndSurname,
    /// Single-token name equal to the other name's surname
    Surname,
}

/// Decide whether two names refer to the same person.
///
/// Applies the rules in order and returns the first that matches, or `None`.
pub fn names_match(a: &str, b: &str) -> Option<MatchRule> {
    let na = normalise_name(a);
    let nb = normalise_name(b);
    if na.is_empty() || nb.is_empty() {
        return None;
    }

    if na == nb {
        return Some(MatchRule::Exact);
    }

    if alias_match(&na, &nb) {
        return Some(MatchRule::Alias);
    }

    let ta: Vec<&str> = na.split(' ').collect();
    let tb: Vec<&str> = nb.split(' ').collect();

    if ta.len() == 2 && tb.len() == 2 && ta[0] == tb[1] && ta[1] == tb[0] {
        return Some(MatchRule::Reversed);
    }

    if word_subset(&ta, &tb) || word_subset(&tb, &ta) {
        return Some(MatchRule::WordSubset);
    }

    if ta.len() >= 2 && tb.len() >= 2 {
        let (fa, la) = (ta[0], ta[ta.len() - 1]);
        let (fb, lb) = (tb[0], tb[tb.len() - 1]);
        if fa == fb && la == lb {
            return Some(MatchRule::FirstAndSurname);
        }
    }

    if ta.len() == 1 && tb.len() >= 2 && ta[0] == tb[tb.len() - 1] {
        return Some(MatchRule::Surname);
    }
    if tb.len() == 1 && ta.len() >= 2 && tb[0] == ta[ta.len() - 1] {
        return Some(MatchRule::Surname);
    }

    None
}

/// True when the alias table links the two normalised names.
fn alias_match(na: &str, nb: &str) -> bool {
    ALIASES.iter().any(|(alias, canonical)| {
        (*alias == na && *canonical == nb) || (*alias == nb && *canonical == na)
    })
}

/// True when every token of `shorter` appears as a whole word in `longer`.
///
/// Whole-word containment only; substring hits ("ye" inside "west") never
/// count. Requires `shorter` to actually be the shorter or equal token list.
fn word_subset(shorter: &[&str], longer: &[&str]) -> bool {
    if shorter.len() > longer.len() || shorter.is_empty() {
        return false;
    }
    shorter.iter().all(|w| longer.contains(w))
}
