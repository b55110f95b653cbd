//! Fingerprints for (call-site, callee) edges
//!
//! A fingerprint identifies one edge from a call site to a traced member:
//!
//! ```text
//! <caller file>-<caller class>-<caller function>-<callee class>-<callee method>-<line>
//! ```
//!
//! Two invocations share a fingerprint iff all six fields match. The caller
//! class is extracted from the caller's receiver description with a pattern
//! built from the configured caller prefix; when nothing matches the field
//! is left empty, so such call sites coalesce with each other whenever the
//! remaining fields agree.

use crate::call_site::CallerContext;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hasher;

/// Field delimiter in the ledger line format
pub const DELIMITER: char = '-';

/// One (call-site, callee) edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub caller_file: String,
    pub caller_class: String,
    pub caller_function: String,
    pub callee_class: String,
    pub callee_method: String,
    pub line: u32,
}

impl Fingerprint {
    /// Assemble a fingerprint, folding line terminators in fields to spaces
    pub fn new(
        caller_file: &str,
        caller_class: &str,
        caller_function: &str,
        callee_class: &str,
        callee_method: &str,
        line: u32,
    ) -> Self {
        Self {
            caller_file: single_line(caller_file),
            caller_class: single_line(caller_class),
            caller_function: single_line(caller_function),
            callee_class: single_line(callee_class),
            callee_method: single_line(callee_method),
            line,
        }
    }

    /// Parse a ledger line (with or without its terminator)
    ///
    /// Fields are split from the right; the caller file is the only field
    /// allowed to contain the delimiter.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.contains('\n') {
            return None;
        }

        let mut fields = line.rsplitn(6, DELIMITER);
        let line_no = fields.next()?.parse::<u32>().ok()?;
        let callee_method = fields.next()?;
        let callee_class = fields.next()?;
        let caller_function = fields.next()?;
        let caller_class = fields.next()?;
        let caller_file = fields.next()?;

        Some(Self {
            caller_file: caller_file.to_string(),
            caller_class: caller_class.to_string(),
            caller_function: caller_function.to_string(),
            callee_class: callee_class.to_string(),
            callee_method: callee_method.to_string(),
            line: line_no,
        })
    }

    /// The ledger line for this fingerprint, terminator included
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }

    /// Short 64-bit FNV-1a id of the fingerprint text
    pub fn id(&self) -> u64 {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write(self.to_string().as_bytes());
        hasher.finish()
    }

    /// `Class.method` of the callee
    pub fn callee(&self) -> String {
        format!("{}.{}", self.callee_class, self.callee_method)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{file}{d}{cc}{d}{cf}{d}{kc}{d}{km}{d}{line}",
            file = self.caller_file,
            cc = self.caller_class,
            cf = self.caller_function,
            kc = self.callee_class,
            km = self.callee_method,
            line = self.line,
            d = DELIMITER,
        )
    }
}

fn single_line(field: &str) -> String {
    field.replace(&['\n', '\r'][..], " ")
}

/// Builds fingerprints from explicit caller context
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    caller_prefix: String,
    caller_class: Regex,
    repr: Regex,
}

impl FingerprintBuilder {
    /// Compile the caller-class pattern for `caller_prefix`
    ///
    /// Receiver paths are matched in dotted form. The prefixed module must
    /// follow at least one enclosing segment, and everything after it is the
    /// class: with prefix `test_`, `suite::test_login::pages::LoginTest`
    /// yields `pages.LoginTest` while `test_login::LoginTest` yields nothing.
    pub fn new(caller_prefix: &str) -> Result<Self, regex::Error> {
        let caller_class = Regex::new(&format!(
            r"^.*?\.{}.*?\.(.*)$",
            regex::escape(caller_prefix)
        ))?;
        let repr = Regex::new(r"^<(.*?) object at .*?>$")?;

        Ok(Self {
            caller_prefix: caller_prefix.to_string(),
            caller_class,
            repr,
        })
    }

    pub fn caller_prefix(&self) -> &str {
        &self.caller_prefix
    }

    /// Logical class name of the caller, empty when it cannot be matched
    pub fn caller_class(&self, receiver: Option<&str>) -> String {
        let Some(text) = receiver else {
            return String::new();
        };

        let path = match self.repr.captures(text) {
            Some(caps) => caps[1].to_string(),
            None => text
                .split('<')
                .next()
                .unwrap_or_default()
                .replace("::", "."),
        };

        self.caller_class
            .captures(&path)
            .map(|caps| caps[1].to_string())
            .unwrap_or_default()
    }

    /// Fingerprint of a call from `caller` to `callee_class.callee_method`
    pub fn build(
        &self,
        caller: &CallerContext,
        callee_class: &str,
        callee_method: &str,
    ) -> Fingerprint {
        let site = caller.site();
        Fingerprint::new(
            &site.file,
            &self.caller_class(caller.receiver_text()),
            &site.function,
            callee_class,
            callee_method,
            site.line,
        )
    }
}
