//! Declarative action matcher.
//!
//! Each resolution pass is expressed as an [`ActionMatcher`] value instead of
//! ad-hoc string checks. Every non-empty constraint must hold for a match.

use crate::core::registry::ActionDefinition;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionMatcher {
    /// Action name must equal this verbatim.
    pub exact_name: Option<String>,
    /// At least one must appear in the action name.
    pub name_keywords: Vec<String>,
    /// Every qualifier must appear in the action name.
    pub name_qualifiers: Vec<String>,
    /// At least one must prefix a word of the action documentation.
    pub documentation_keywords: Vec<String>,
    /// None may appear in the action documentation.
    pub excluded_phrases: Vec<String>,
    /// Must appear in the action documentation as whole words, not negated.
    pub preferred_marker: Option<String>,
    /// Match name keywords as substrings rather than whole name tokens.
    pub substring: bool,
}

impl ActionMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exact(mut self, name: impl Into<String>) -> Self {
        self.exact_name = Some(name.into());
        self
    }

    pub fn name_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn qualifiers<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.name_qualifiers = qualifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn documentation_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documentation_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn excluding<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_phrases = phrases.into_iter().map(Into::into).collect();
        self
    }

    pub fn preferred(mut self, marker: impl Into<String>) -> Self {
        self.preferred_marker = Some(marker.into());
        self
    }

    pub fn substring(mut self) -> Self {
        self.substring = true;
        self
    }

    pub fn matches(&self, name: &str, action: &ActionDefinition) -> bool {
        let lowered_name = name.to_lowercase();
        let documentation = action.documentation();

        if let Some(exact) = &self.exact_name {
            if name != exact {
                return false;
            }
        }

        let tokens = tokenize(&lowered_name);
        let name_has = |keyword: &str| {
            let keyword = keyword.to_lowercase();
            if self.substring {
                lowered_name.contains(&keyword)
            } else {
                tokens.iter().any(|token| *token == keyword)
            }
        };

        if !self.name_keywords.is_empty() && !self.name_keywords.iter().any(|kw| name_has(kw.as_str())) {
            return false;
        }
        if !self.name_qualifiers.iter().all(|q| name_has(q.as_str())) {
            return false;
        }

        if !self.documentation_keywords.is_empty() {
            let words = tokenize(&documentation);
            let hit = self.documentation_keywords.iter().any(|keyword| {
                let keyword = keyword.to_lowercase();
                words.iter().any(|word| word.starts_with(keyword.as_str()))
            });
            if !hit {
                return false;
            }
        }

        if self
            .excluded_phrases
            .iter()
            .any(|phrase| documentation.contains(&phrase.to_lowercase()))
        {
            return false;
        }

        if let Some(marker) = &self.preferred_marker {
            if !affirms(&documentation, marker) {
                return false;
            }
        }

        true
    }
}

/// Words that negate a marker appearing within the next two words.
const NEGATIONS: &[&str] = &["not", "no", "never", "non", "isn", "aren", "nor"];

/// True when `marker` occurs as a word sequence in `text` and neither of the
/// two preceding words negates it.
fn affirms(text: &str, marker: &str) -> bool {
    let marker = marker.to_lowercase();
    let wanted = tokenize(&marker);
    let text = text.to_lowercase();
    let words = tokenize(&text);
    if wanted.is_empty() || words.len() < wanted.len() {
        return false;
    }
    (0..=words.len() - wanted.len()).any(|start| {
        words[start..start + wanted.len()] == wanted[..]
            && !words[start.saturating_sub(2)..start]
                .iter()
                .any(|word| NEGATIONS.contains(word))
    })
}

/// Split an identifier or sentence into lowercase alphanumeric words.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect()
}
