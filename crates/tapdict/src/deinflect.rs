//! Seam for turning inflected text into dictionary forms.
//!
//! Deinflection itself lives outside this crate. A host plugs its own
//! [`Deinflector`] into [`Engine::new`], and the forms it produces are looked
//! up after the literal text by [`Engine::find_matches`].
//!
//! [`Engine::new`]: crate::Engine::new
//! [`Engine::find_matches`]: crate::Engine::find_matches

/// Dictionary form proposed for a prefix of some text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Deinflection {
    /// Form to look up, e.g. `食べる` for `食べた`.
    pub lemma: String,
    /// How many characters of the input text this form accounts for.
    pub scan_len: usize,
}

impl Deinflection {
    /// Creates a deinflection.
    #[must_use]
    pub fn new(lemma: impl Into<String>, scan_len: usize) -> Self {
        Self {
            lemma: lemma.into(),
            scan_len,
        }
    }
}

/// Produces dictionary forms for the start of a piece of text.
pub trait Deinflector: Send + Sync {
    /// Candidate dictionary forms for prefixes of `text`.
    fn deinflect(&self, text: &str) -> Vec<Deinflection>;
}

/// Proposes the text itself, unchanged.
///
/// Since literal prefixes are always looked up, this never adds new matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Deinflector for Identity {
    fn deinflect(&self, text: &str) -> Vec<Deinflection> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![Deinflection::new(text, text.chars().count())]
    }
}

impl<F> Deinflector for F
where
    F: Fn(&str) -> Vec<Deinflection> + Send + Sync,
{
    fn deinflect(&self, text: &str) -> Vec<Deinflection> {
        self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity() {
        assert_eq!(vec![Deinflection::new("食べた", 3)], Identity.deinflect("食べた"));
        assert!(Identity.deinflect("").is_empty());
    }

    #[test]
    fn closure() {
        let deinflector = |text: &str| {
            text.strip_suffix("た")
                .map(|stem| vec![Deinflection::new(format!("{stem}る"), text.chars().count())])
                .unwrap_or_default()
        };
        assert_eq!(
            vec![Deinflection::new("食べる", 3)],
            deinflector.deinflect("食べた")
        );
    }
}
