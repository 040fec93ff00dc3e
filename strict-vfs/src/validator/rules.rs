use crate::VfsError;
use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// SUMMARY:
    /// Path-safety rules a storage enforces before touching its target.
    ///
    /// DETAILS:
    /// Rules combine with `|` and are evaluated in declaration order:
    /// `IN_ALLOWED_ROOTS`, `DISALLOW_SYMLINK`, `IN_SAFEROOT`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Rules: u8 {
        /// The path must lie under one of the process-wide allowed roots (empty list passes).
        const IN_ALLOWED_ROOTS = 1 << 0;
        /// An existing path must not be a symbolic link.
        const DISALLOW_SYMLINK = 1 << 1;
        /// The path must not escape its safe root.
        const IN_SAFEROOT = 1 << 2;
        const STRICT = Self::IN_ALLOWED_ROOTS.bits()
            | Self::DISALLOW_SYMLINK.bits()
            | Self::IN_SAFEROOT.bits();
    }
}

impl Rules {
    /// No rules.
    pub const LOOSE: Rules = Rules::empty();
}

impl Default for Rules {
    fn default() -> Self {
        Rules::IN_ALLOWED_ROOTS | Rules::IN_SAFEROOT
    }
}

/// A single rule, as reported by a violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    InAllowedRoots,
    DisallowSymlink,
    InSafeRoot,
}

impl Rule {
    /// All rules in evaluation order.
    pub const ALL: [Rule; 3] = [Rule::InAllowedRoots, Rule::DisallowSymlink, Rule::InSafeRoot];

    pub fn flag(self) -> Rules {
        match self {
            Rule::InAllowedRoots => Rules::IN_ALLOWED_ROOTS,
            Rule::DisallowSymlink => Rules::DISALLOW_SYMLINK,
            Rule::InSafeRoot => Rules::IN_SAFEROOT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rule::InAllowedRoots => "in_allowed_roots",
            Rule::DisallowSymlink => "disallow_symlink",
            Rule::InSafeRoot => "in_saferoot",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("loose");
        }
        if *self == Rules::STRICT {
            return f.write_str("strict");
        }
        let mut first = true;
        for rule in Rule::ALL.into_iter().filter(|r| self.contains(r.flag())) {
            if !first {
                f.write_str(" | ")?;
            }
            f.write_str(rule.name())?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Rules {
    type Err = VfsError;

    /// Accepts rule names separated by `|` or `,`, e.g. `"in_saferoot | disallow_symlink"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rules = Rules::LOOSE;
        for token in s.split(['|', ',']).map(str::trim).filter(|t| !t.is_empty()) {
            rules |= match token.to_ascii_lowercase().as_str() {
                "loose" => Rules::LOOSE,
                "strict" => Rules::STRICT,
                "in_allowed_roots" => Rules::IN_ALLOWED_ROOTS,
                "disallow_symlink" => Rules::DISALLOW_SYMLINK,
                "in_saferoot" => Rules::IN_SAFEROOT,
                other => {
                    return Err(VfsError::InvalidValue(format!("unknown rule `{other}`")));
                }
            };
        }
        Ok(rules)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Rules {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Rules {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
