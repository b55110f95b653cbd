//! Call-site identification
//!
//! A [`CallSite`] names the location a traced member is invoked from: the
//! source file, the line, and the enclosing function. Callers pass it
//! explicitly, usually through the [`call_site!`](crate::call_site!) or
//! [`caller!`](crate::caller!) macros which expand to `file!()`, `line!()`
//! and the enclosing function's path.
//!
//! [`CallSite::capture`] is the implicit variant: file and line come from
//! `#[track_caller]`, and the function name is recovered by walking the
//! local stack with the `backtrace` crate and matching the frame whose debug
//! info points at that file and line. Without debug info the function name
//! stays empty; capture never fails.

use std::any::type_name;
use std::panic::Location;
use std::path::Path;

/// Maximum stack depth to walk when resolving the caller function
const MAX_STACK_DEPTH: usize = 64;

/// Source location of a call
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Source file of the caller
    pub file: String,
    /// Line of the call within `file`
    pub line: u32,
    /// Name of the calling function (empty if unknown)
    pub function: String,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }

    /// Capture the location of the caller of this function
    #[track_caller]
    pub fn capture() -> Self {
        let location = Location::caller();
        let function = resolve_function(location.file(), location.line()).unwrap_or_default();
        Self::new(location.file(), location.line(), function)
    }

    /// Same site, different line
    pub fn at_line(&self, line: u32) -> Self {
        Self {
            line,
            ..self.clone()
        }
    }
}

/// Explicit identity of whoever is making a traced call
///
/// Bundles the [`CallSite`] with an optional textual description of the
/// calling object (a type path such as `suite::test_login::LoginTest`, or a
/// repr like `<suite.test_login.LoginTest object at 0x7f>`). The
/// description is what the caller-class field of a fingerprint is
/// extracted from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    site: CallSite,
    receiver: Option<String>,
}

impl CallerContext {
    pub fn new(site: CallSite) -> Self {
        Self {
            site,
            receiver: None,
        }
    }

    /// Context for the caller of this function, see [`CallSite::capture`]
    #[track_caller]
    pub fn here() -> Self {
        Self::new(CallSite::capture())
    }

    /// Describe the calling object by its type path
    pub fn with_receiver<R: ?Sized>(self, _receiver: &R) -> Self {
        self.with_receiver_text(type_name::<R>())
    }

    /// Describe the calling object by arbitrary text
    pub fn with_receiver_text(mut self, text: impl Into<String>) -> Self {
        self.receiver = Some(text.into());
        self
    }

    pub fn site(&self) -> &CallSite {
        &self.site
    }

    pub fn receiver_text(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    /// Same caller, different line
    pub fn at_line(&self, line: u32) -> Self {
        Self {
            site: self.site.at_line(line),
            receiver: self.receiver.clone(),
        }
    }
}

/// Last meaningful segment of a function path
///
/// Drops the marker item the macros declare, closure segments and a
/// trailing symbol hash: `suite::test_login::{{closure}}::__here` becomes
/// `test_login`.
pub fn enclosing_function(path: &str) -> String {
    path.split("::")
        .filter(|segment| {
            !segment.is_empty()
                && !segment.starts_with("{{")
                && *segment != "__here"
                && !is_symbol_hash(segment)
        })
        .last()
        .unwrap_or_default()
        .to_string()
}

fn is_symbol_hash(segment: &str) -> bool {
    segment.len() == 17
        && segment.starts_with('h')
        && segment[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Walk the local stack for the frame at `file:line` and name its function
fn resolve_function(file: &str, line: u32) -> Option<String> {
    let target = Path::new(file);
    let mut found: Option<String> = None;
    let mut depth = 0;

    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            if found.is_some() {
                return;
            }
            let (Some(filename), Some(lineno)) = (symbol.filename(), symbol.lineno()) else {
                return;
            };
            if lineno == line && filename.ends_with(target) {
                found = symbol
                    .name()
                    .map(|name| enclosing_function(&format!("{:#}", name)));
            }
        });
        depth += 1;
        found.is_none() && depth < MAX_STACK_DEPTH
    });

    if found.is_none() {
        tracing::debug!("No debug info for caller at {}:{}", file, line);
    }
    found.filter(|name| !name.is_empty())
}

/// Build a [`CallSite`] for the current location
///
/// ```
/// let site = runledger::call_site!();
/// assert!(site.file.ends_with(".rs"));
/// ```
#[macro_export]
macro_rules! call_site {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::call_site::CallSite::new(
            file!(),
            line!(),
            $crate::call_site::enclosing_function(__type_name_of(__here)),
        )
    }};
}

/// Build a [`CallerContext`] for the current location
///
/// `caller!()` leaves the caller class empty; `caller!(self)` (or any
/// reference) describes the calling object by its type.
#[macro_export]
macro_rules! caller {
    () => {
        $crate::call_site::CallerContext::new($crate::call_site!())
    };
    ($receiver:expr) => {
        $crate::call_site::CallerContext::new($crate::call_site!()).with_receiver($receiver)
    };
}
