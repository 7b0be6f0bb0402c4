use std::any::Any;
use std::fmt;

/// Why a target refused a replayed name or value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayRejection {
    UnknownAttribute(String),
    UnknownElement(String),
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
    /// `accept_child` got a sub-target it did not create
    ChildTypeMismatch(String),
}

impl fmt::Display for ReplayRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayRejection::UnknownAttribute(name) => {
                write!(f, "unsupported attribute \"{}\"", name)
            }
            ReplayRejection::UnknownElement(name) => {
                write!(f, "unsupported nested element \"{}\"", name)
            }
            ReplayRejection::InvalidValue {
                name,
                value,
                reason,
            } => write!(f, "invalid value \"{}\" for \"{}\": {}", value, name, reason),
            ReplayRejection::ChildTypeMismatch(name) => {
                write!(f, "nested element \"{}\" has an unexpected type", name)
            }
        }
    }
}

/// Conversion of a boxed target back to `Any`, implemented for every `'static` type.
pub trait AnyTarget: Any {
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AnyTarget for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Settable/creatable capability every replay target provides.
///
/// Replay drives a target in three steps per nested element: `create_child`
/// opens the scope, the child is configured, `accept_child` hands it back.
pub trait ReplayTarget: AnyTarget {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ReplayRejection>;

    fn create_child(&mut self, name: &str) -> Result<Box<dyn ReplayTarget>, ReplayRejection>;

    fn accept_child(
        &mut self,
        name: &str,
        child: Box<dyn ReplayTarget>,
    ) -> Result<(), ReplayRejection>;
}

/// Recover the concrete type of a sub-target inside `accept_child`.
pub fn downcast_child<T: ReplayTarget>(
    name: &str,
    child: Box<dyn ReplayTarget>,
) -> Result<Box<T>, ReplayRejection> {
    child
        .into_any()
        .downcast::<T>()
        .map_err(|_| ReplayRejection::ChildTypeMismatch(name.to_string()))
}

/// Parse a boolean attribute the way declarative build files spell them.
pub fn parse_flag(name: &str, value: &str) -> Result<bool, ReplayRejection> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => Err(ReplayRejection::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: "expected true/false, yes/no or on/off".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;

    impl ReplayTarget for Leaf {
        fn set_attribute(&mut self, name: &str, _value: &str) -> Result<(), ReplayRejection> {
            Err(ReplayRejection::UnknownAttribute(name.to_string()))
        }

        fn create_child(&mut self, name: &str) -> Result<Box<dyn ReplayTarget>, ReplayRejection> {
            Err(ReplayRejection::UnknownElement(name.to_string()))
        }

        fn accept_child(
            &mut self,
            name: &str,
            _child: Box<dyn ReplayTarget>,
        ) -> Result<(), ReplayRejection> {
            Err(ReplayRejection::UnknownElement(name.to_string()))
        }
    }

    #[test]
    fn test_downcast_child_matches_concrete_type() {
        let boxed: Box<dyn ReplayTarget> = Box::new(Leaf);
        assert!(downcast_child::<Leaf>("leaf", boxed).is_ok());

        let boxed: Box<dyn ReplayTarget> = Box::new(Leaf);
        let err = downcast_child::<crate::capture::ConfigNode>("leaf", boxed).unwrap_err();
        assert_eq!(err, ReplayRejection::ChildTypeMismatch("leaf".to_string()));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("v", "Yes"), Ok(true));
        assert_eq!(parse_flag("v", "off"), Ok(false));
        assert!(parse_flag("v", "maybe").is_err());
    }

    #[test]
    fn test_rejection_messages() {
        let msg = ReplayRejection::UnknownAttribute("colour".to_string()).to_string();
        assert!(msg.contains("colour"));
    }
}
