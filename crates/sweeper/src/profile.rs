//! Localized text profiles.
//!
//! The rendered document carries no stable identifiers for the controls this
//! engine drives, so text matching is one of the locator's strongest signals.
//! A [`LocaleProfile`] bundles the patterns for the three text semantics the
//! pipeline cares about: the destructive menu item, the confirmation control,
//! and the success toast.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// A compiled, case-insensitive pattern list.
#[derive(Debug)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile a pattern set. Patterns are anchored by the caller where
    /// anchoring matters; all matching is case-insensitive.
    fn new(patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).expect("profile pattern must compile"))
            .collect();
        Self { patterns }
    }

    /// Whether any pattern matches the given text (whitespace-trimmed).
    pub fn matches_text(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

/// A localized set of text patterns used to recognize menu items,
/// confirmation controls and success messages. Read-only once resolved.
#[derive(Debug)]
pub struct LocaleProfile {
    pub id: &'static str,
    pub menu_item: PatternSet,
    pub confirm: PatternSet,
    pub success: PatternSet,
}

/// One entry of the resolver's ordered matcher list.
pub struct ProfileMatcher {
    pub profile: LocaleProfile,
    applies: fn(&[String]) -> bool,
}

fn sk_cz_applies(signals: &[String]) -> bool {
    signals
        .iter()
        .any(|s| s.starts_with("sk") || s.starts_with("cs"))
}

fn always(_signals: &[String]) -> bool {
    true
}

/// Ordered matcher registry. The final entry is the catch-all default and
/// matches any signal list, so resolution always terminates with a profile.
static MATCHERS: Lazy<Vec<ProfileMatcher>> = Lazy::new(|| {
    vec![
        ProfileMatcher {
            profile: LocaleProfile {
                id: "sk-cz",
                menu_item: PatternSet::new(&[
                    "^vymaza(ť|t)$",
                    "^odstráni(ť|t)$",
                    "^smazat$",
                    "^odstranit$",
                ]),
                confirm: PatternSet::new(&[
                    "^vymaza(ť|t)$",
                    "^smazat$",
                    "^potvrdi(ť|t)$",
                    "^áno",
                    "^ano",
                ]),
                success: PatternSet::new(&[
                    "vymazan",
                    "smazán",
                    "odstránen",
                    "odstraněn",
                ]),
            },
            applies: sk_cz_applies,
        },
        ProfileMatcher {
            profile: LocaleProfile {
                id: "default",
                menu_item: PatternSet::new(&["^delete$", "^remove$", "^delete (conversation|chat)$"]),
                confirm: PatternSet::new(&["^delete$", "^confirm$", "^yes,? delete"]),
                success: PatternSet::new(&["deleted", "removed"]),
            },
            applies: always,
        },
    ]
});

/// Select a profile for an ordered list of lowercase locale tags
/// (document-declared language first, then platform-reported languages).
///
/// The first matcher whose predicate accepts the signal list wins. There is
/// no error path: the trailing default always matches.
pub fn resolve(locale_signals: &[String]) -> &'static LocaleProfile {
    let profile = resolve_from(&MATCHERS, locale_signals);
    debug!(profile = profile.id, ?locale_signals, "resolved locale profile");
    profile
}

fn resolve_from<'m>(matchers: &'m [ProfileMatcher], signals: &[String]) -> &'m LocaleProfile {
    matchers
        .iter()
        .find(|m| (m.applies)(signals))
        .map(|m| &m.profile)
        .expect("matcher list must end with a catch-all")
}
