use crate::checker::Checker;
use crate::rules;

/// Explicit set of rules a lint run executes, in registration order.
#[derive(Default)]
pub struct RuleRegistry {
    checkers: Vec<Box<dyn Checker>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rule.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for checker in rules::standard() {
            registry.register(checker);
        }
        registry
    }

    /// Adds `checker`, replacing any rule registered under the same name.
    pub fn register(&mut self, checker: Box<dyn Checker>) -> &mut Self {
        self.checkers.retain(|existing| existing.name() != checker.name());
        self.checkers.push(checker);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Checker> {
        self.checkers
            .iter()
            .find(|checker| checker.name() == name)
            .map(|checker| checker.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.checkers.iter().map(|checker| checker.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Checker> {
        self.checkers.iter().map(|checker| checker.as_ref())
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}
