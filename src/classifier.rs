//! Callable classification for class members
//!
//! Decides whether invoking a member takes an implicit receiver (instance
//! member) or not (static member). The decision is a naming-convention
//! heuristic over the declared parameter list:
//!
//! 1. Names starting with `_` are non-public and never classified
//! 2. Non-callable members (plain attributes) are never static
//! 3. Only positionally suppliable parameters are considered
//! 4. No positional parameters: static
//! 5. First positional parameter named [`RECEIVER_NAME`]: instance, else static
//!
//! A static function whose first parameter happens to be named `self` is
//! classified as an instance member. Other code paths rely on the same
//! convention, so this is kept as is.

/// Conventional name of the receiver parameter
pub const RECEIVER_NAME: &str = "self";

/// How a declared parameter can be supplied by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Only by position
    PositionalOnly,
    /// By position or by name
    PositionalOrKeyword,
    /// Variadic positional tail
    VarPositional,
    /// Only by name
    KeywordOnly,
    /// Variadic named tail
    VarKeyword,
}

impl ParamKind {
    /// True for parameters a caller can fill positionally one at a time
    pub fn is_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// Declared shape of a class member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSignature {
    /// Member name as looked up on the class
    pub name: String,
    /// False for plain data attributes
    pub callable: bool,
    /// Declared parameters in order
    pub params: Vec<Param>,
}

impl MemberSignature {
    /// Start a callable member with no parameters
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callable: true,
            params: Vec::new(),
        }
    }

    /// Start an instance method (first parameter is the receiver)
    pub fn method(name: impl Into<String>) -> Self {
        Self::function(name).param(RECEIVER_NAME)
    }

    /// A non-callable attribute
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callable: false,
            params: Vec::new(),
        }
    }

    /// Append a positional-or-keyword parameter
    pub fn param(self, name: impl Into<String>) -> Self {
        self.with_param(name, ParamKind::PositionalOrKeyword)
    }

    /// Append a positional-only parameter
    pub fn positional_only(self, name: impl Into<String>) -> Self {
        self.with_param(name, ParamKind::PositionalOnly)
    }

    /// Append a keyword-only parameter
    pub fn keyword_only(self, name: impl Into<String>) -> Self {
        self.with_param(name, ParamKind::KeywordOnly)
    }

    /// Append a variadic positional parameter
    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.with_param(name, ParamKind::VarPositional)
    }

    /// Append a variadic named parameter
    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.with_param(name, ParamKind::VarKeyword)
    }

    fn with_param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
        });
        self
    }

    /// Names of the parameters that can be supplied positionally
    pub fn positional_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.kind.is_positional())
            .map(|p| p.name.as_str())
    }
}

/// Calling convention of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Invoked without a receiver
    Static,
    /// Receiver is bound as the first parameter
    Instance,
}

/// Public members are those not prefixed with an underscore
pub fn is_public(name: &str) -> bool {
    !name.starts_with('_')
}

/// Classify a member, or `None` for non-public and non-callable members
pub fn classify(member: &MemberSignature) -> Option<CallKind> {
    if !is_public(&member.name) || !member.callable {
        return None;
    }

    match member.positional_names().next() {
        None => Some(CallKind::Static),
        Some(first) if first == RECEIVER_NAME => Some(CallKind::Instance),
        Some(_) => Some(CallKind::Static),
    }
}

/// True when invoking `member` takes no implicit receiver
pub fn is_static(member: &MemberSignature) -> bool {
    classify(member) == Some(CallKind::Static)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_params_is_static() {
        let sig = MemberSignature::function("version");
        assert!(is_static(&sig));
        assert_eq!(classify(&sig), Some(CallKind::Static));
    }

    #[test]
    fn test_receiver_first_is_instance() {
        let sig = MemberSignature::method("click").param("selector");
        assert!(!is_static(&sig));
        assert_eq!(classify(&sig), Some(CallKind::Instance));
    }

    #[test]
    fn test_other_first_param_is_static() {
        let sig = MemberSignature::function("add_two").param("a").param("b");
        assert!(is_static(&sig));
    }

    #[test]
    fn test_static_named_self_is_misclassified_as_instance() {
        // Regression: the heuristic only looks at the name. A static
        // function whose first parameter is `self` reads as an instance
        // member and must keep doing so.
        let sig = MemberSignature::function("helper").param("self").param("value");
        assert_eq!(classify(&sig), Some(CallKind::Instance));
        assert!(!is_static(&sig));
    }

    #[test]
    fn test_private_names_never_classified() {
        let sig = MemberSignature::function("_internal");
        assert_eq!(classify(&sig), None);
        assert!(!is_static(&sig));

        let sig = MemberSignature::method("__init");
        assert_eq!(classify(&sig), None);
    }

    #[test]
    fn test_attribute_is_not_static() {
        let sig = MemberSignature::attribute("timeout");
        assert_eq!(classify(&sig), None);
        assert!(!is_static(&sig));
    }

    #[test]
    fn test_only_positional_params_are_considered() {
        // Keyword-only and variadic parameters cannot carry the receiver
        let sig = MemberSignature::function("configure")
            .var_positional("self")
            .keyword_only("timeout")
            .var_keyword("extra");
        assert_eq!(sig.positional_names().count(), 0);
        assert!(is_static(&sig));

        let sig = MemberSignature::function("fill")
            .keyword_only("value")
            .positional_only("self");
        assert_eq!(classify(&sig), Some(CallKind::Instance));
    }

    #[test]
    fn test_param_kind_positional() {
        assert!(ParamKind::PositionalOnly.is_positional());
        assert!(ParamKind::PositionalOrKeyword.is_positional());
        assert!(!ParamKind::VarPositional.is_positional());
        assert!(!ParamKind::KeywordOnly.is_positional());
        assert!(!ParamKind::VarKeyword.is_positional());
    }

    #[test]
    fn test_is_public() {
        assert!(is_public("click"));
        assert!(!is_public("_click"));
        assert!(!is_public("__new"));
    }
}
