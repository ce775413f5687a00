use regex::Regex;

/// A glob where `*` matches any run of characters and everything else is
/// literal. Matching is anchored and case-sensitive.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let body = source
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^(?s:{body})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// Number of literal characters; the more, the more specific.
    pub fn specificity(&self) -> usize {
        self.source.chars().filter(|&c| c != '*').count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(sources: &[S]) -> Result<Self, regex::Error> {
        let patterns = sources
            .iter()
            .map(|s| Pattern::new(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Specificity of the most specific pattern matching `candidate`.
    pub fn best_match(&self, candidate: &str) -> Option<usize> {
        self.patterns
            .iter()
            .filter(|p| p.is_match(candidate))
            .map(Pattern::specificity)
            .max()
    }

    pub fn matches_any(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(candidate))
    }
}
