//! Protected / insulated name sets.

use std::collections::HashSet;

use super::options::SandboxOptions;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableClass {
    /// Always the one real global binding.
    Protected,
    /// Always per-sandbox, even for reads.
    Insulated,
    PassThrough,
}

#[derive(Debug, Default)]
pub struct VariableClassifier {
    protected: HashSet<String>,
    insulated: HashSet<String>,
}

impl VariableClassifier {
    pub fn new<P, I>(protected: P, insulated: I) -> Self
    where
        P: IntoIterator<Item = String>,
        I: IntoIterator<Item = String>,
    {
        VariableClassifier {
            protected: protected.into_iter().collect(),
            insulated: insulated.into_iter().collect(),
        }
    }

    /// Evaluates the option's name sources afresh.
    pub fn from_options(options: &SandboxOptions) -> Self {
        VariableClassifier::new(options.protected_names(), options.insulated_names())
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(name)
    }

    pub fn is_insulated(&self, name: &str) -> bool {
        self.insulated.contains(name)
    }

    /// Protected wins over insulated.
    pub fn classify(&self, name: &str) -> VariableClass {
        if self.is_protected(name) {
            VariableClass::Protected
        } else if self.is_insulated(name) {
            VariableClass::Insulated
        } else {
            VariableClass::PassThrough
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_protected_takes_precedence() {
        let classifier = VariableClassifier::new(names(&["theme", "shared"]), names(&["shared", "counter"]));
        assert_eq!(classifier.classify("theme"), VariableClass::Protected);
        assert_eq!(classifier.classify("shared"), VariableClass::Protected);
        assert_eq!(classifier.classify("counter"), VariableClass::Insulated);
        assert_eq!(classifier.classify("other"), VariableClass::PassThrough);
    }

    #[test]
    fn test_sources_are_reevaluated() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let options = SandboxOptions::new().with_protect_variable(move || {
            counter.set(counter.get() + 1);
            vec![format!("v{}", counter.get())]
        });
        let first = VariableClassifier::from_options(&options);
        let second = VariableClassifier::from_options(&options);
        assert!(first.is_protected("v1"));
        assert!(second.is_protected("v2"));
        assert!(!second.is_protected("v1"));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_empty_options() {
        let classifier = VariableClassifier::from_options(&SandboxOptions::new());
        assert!(!classifier.is_protected("window"));
        assert!(!classifier.is_insulated("window"));
    }
}
