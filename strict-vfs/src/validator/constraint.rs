use super::{AllowedRoots, Rule, Rules};
use crate::error::path_label;
use crate::path::path_history::{PathHistory, Raw};
use crate::{Result, VfsPath};
use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    rule: Rule,
    path: PathBuf,
    reason: String,
}

impl Violation {
    pub fn new(rule: Rule, path: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            rule,
            path,
            reason: reason.into(),
        }
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule `{}` failed for {}: {}",
            self.rule,
            path_label(&self.path),
            self.reason
        )
    }
}

/// SUMMARY:
/// Every rule that failed for one path, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    pub fn rules(&self) -> Rules {
        self.0
            .iter()
            .fold(Rules::LOOSE, |acc, violation| acc | violation.rule.flag())
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(value: Vec<Violation>) -> Self {
        Self(value)
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} path rule(s) violated", self.0.len())?;
        for violation in &self.0 {
            write!(f, "; {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Violations {}

struct Subject<'a> {
    path: &'a VfsPath,
    allowed_roots: &'a AllowedRoots,
}

impl Subject<'_> {
    fn shown(&self) -> PathBuf {
        self.path.raw().to_path_buf()
    }
}

type Evaluator = fn(&Subject<'_>) -> Option<Violation>;

// Evaluation order is the order of this table.
const EVALUATORS: [(Rule, Evaluator); 3] = [
    (Rule::InAllowedRoots, check_allowed_roots),
    (Rule::DisallowSymlink, check_symlink),
    (Rule::InSafeRoot, check_safe_root),
];

fn check_allowed_roots(subject: &Subject<'_>) -> Option<Violation> {
    if subject.allowed_roots.is_empty() {
        return None;
    }
    match subject.path.location() {
        Ok(location) if subject.allowed_roots.permits(&location) => None,
        Ok(location) => Some(Violation::new(
            Rule::InAllowedRoots,
            subject.shown(),
            format!("{} is outside every allowed root", path_label(&location)),
        )),
        Err(err) => Some(Violation::new(
            Rule::InAllowedRoots,
            subject.shown(),
            format!("path cannot be resolved: {err}"),
        )),
    }
}

fn check_symlink(subject: &Subject<'_>) -> Option<Violation> {
    match std::fs::symlink_metadata(subject.path.raw()) {
        Ok(meta) if meta.file_type().is_symlink() => Some(Violation::new(
            Rule::DisallowSymlink,
            subject.shown(),
            "path is a symbolic link",
        )),
        _ => None,
    }
}

fn check_safe_root(subject: &Subject<'_>) -> Option<Violation> {
    let root = match PathHistory::<Raw>::new(subject.path.safe_root()).canonicalize() {
        Ok(root) => root.into_inner(),
        Err(err) => {
            return Some(Violation::new(
                Rule::InSafeRoot,
                subject.shown(),
                format!("safe root cannot be resolved: {err}"),
            ))
        }
    };
    // `real` may have vanished since the snapshot; fall back to the lexical form then.
    let resolved = subject
        .path
        .real()
        .and_then(|real| PathHistory::<Raw>::new(real).resolve());
    let contained: std::io::Result<std::result::Result<(), PathBuf>> = match resolved {
        Some(resolved) => Ok(resolved
            .boundary_check(&root)
            .map(|_| ())
            .map_err(PathHistory::into_inner)),
        None => PathHistory::<Raw>::new(subject.path.raw())
            .canonicalize()
            .map(|lexical| {
                lexical
                    .boundary_check(&root)
                    .map(|_| ())
                    .map_err(PathHistory::into_inner)
            }),
    };
    match contained {
        Ok(Ok(_)) => None,
        Ok(Err(escaped)) => Some(Violation::new(
            Rule::InSafeRoot,
            subject.shown(),
            format!(
                "{} escapes safe root {}",
                path_label(&escaped),
                path_label(&root)
            ),
        )),
        Err(err) => Some(Violation::new(
            Rule::InSafeRoot,
            subject.shown(),
            format!("path cannot be resolved: {err}"),
        )),
    }
}

/// SUMMARY:
/// Binds a rule set to exactly one path and caches the verdict.
///
/// DETAILS:
/// `evaluate()` runs every enabled rule once, without short-circuiting, and stores the outcome.
/// Later calls (and `violations()` / `check()`) reuse it and do not touch the filesystem again.
/// Rules read the path's current snapshot; callers that mutate the filesystem build a new
/// `Constraint` after reloading the path.
///
/// EXAMPLE:
/// ```rust
/// # use strict_vfs::{Constraint, Rules, VfsPath};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let root = tempfile::tempdir()?;
/// let escape = VfsPath::new([root.path().as_os_str(), "../outside.txt".as_ref()])?;
/// let constraint = Constraint::new(Rules::IN_SAFEROOT, escape);
/// assert!(!constraint.evaluate());
/// assert_eq!(constraint.violations().map(|v| v.len()), Some(1));
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Constraint {
    rules: Rules,
    path: VfsPath,
    allowed_roots: Option<AllowedRoots>,
    verdict: OnceCell<Violations>,
}

impl Constraint {
    pub fn new(rules: Rules, path: VfsPath) -> Self {
        Self {
            rules,
            path,
            allowed_roots: None,
            verdict: OnceCell::new(),
        }
    }

    /// Uses `roots` instead of the process-wide list for `IN_ALLOWED_ROOTS`.
    pub fn with_allowed_roots(mut self, roots: AllowedRoots) -> Self {
        self.allowed_roots = Some(roots);
        self.verdict = OnceCell::new();
        self
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    pub fn is_evaluated(&self) -> bool {
        self.verdict.get().is_some()
    }

    /// Runs every enabled rule on first call; returns whether all passed.
    pub fn evaluate(&self) -> bool {
        self.verdict().is_empty()
    }

    /// Every failed rule, or `None` when all passed. Evaluates on first call.
    pub fn violations(&self) -> Option<&Violations> {
        let verdict = self.verdict();
        (!verdict.is_empty()).then_some(verdict)
    }

    /// `Err(ConstraintViolation)` carrying every failed rule.
    pub fn check(&self) -> Result<()> {
        match self.violations() {
            Some(violations) => Err(violations.clone().into()),
            None => Ok(()),
        }
    }

    fn verdict(&self) -> &Violations {
        self.verdict.get_or_init(|| {
            let subject = Subject {
                path: &self.path,
                allowed_roots: self
                    .allowed_roots
                    .as_ref()
                    .unwrap_or_else(|| AllowedRoots::global()),
            };
            let found: Vec<Violation> = EVALUATORS
                .iter()
                .filter(|(rule, _)| self.rules.contains(rule.flag()))
                .filter_map(|(_, evaluate)| evaluate(&subject))
                .collect();
            if !found.is_empty() {
                tracing::debug!(
                    path = %self.path,
                    rules = %self.rules,
                    failed = found.len(),
                    "path rules violated"
                );
            }
            Violations(found)
        })
    }
}
