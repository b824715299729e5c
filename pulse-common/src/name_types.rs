use serde::{
    de::{Deserialize, Deserializer, Visitor},
    ser::{Serialize, Serializer},
};
use std::{
    cmp::Ordering,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::Arc,
};

/// Marker type to distinguish different name types from each other
pub trait NameMarker: Sized {
    /// Returns type name for Debug printing.
    /// Example: `Address` for sources, `MetricId` for metric definitions
    fn display_name() -> &'static str;
}

/// Generic immutable name. Clone is lightweight
pub struct Name<TMarker: NameMarker> {
    str: Arc<str>,
    _phantom: PhantomData<TMarker>,
}

impl<TMarker: NameMarker> Name<TMarker> {
    pub fn new(val: &str) -> Self {
        Self {
            str: val.into(),
            _phantom: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        self.str.as_ref()
    }
}

#[derive(Debug)]
pub struct AddressMarker;

impl NameMarker for AddressMarker {
    fn display_name() -> &'static str {
        "Address"
    }
}

#[derive(Debug)]
pub struct MetricIdMarker;

impl NameMarker for MetricIdMarker {
    fn display_name() -> &'static str {
        "MetricId"
    }
}

/// Identifier of a metric source, e.g. `os://localhost`
pub type Address = Name<AddressMarker>;

/// Identifier of a metric inside its source
pub type MetricId = Name<MetricIdMarker>;

const SCHEME_SEPARATOR: &str = "://";

impl Address {
    /// Scheme part of the address (`os` for `os://localhost`), selects the source kind.
    pub fn scheme(&self) -> Option<&str> {
        self.as_str()
            .split_once(SCHEME_SEPARATOR)
            .map(|(scheme, _)| scheme)
            .filter(|scheme| !scheme.is_empty())
    }

    /// Everything after `://`.
    pub fn location(&self) -> Option<&str> {
        self.as_str()
            .split_once(SCHEME_SEPARATOR)
            .map(|(_, location)| location)
    }
}

impl<TMarker: NameMarker> Clone for Name<TMarker> {
    fn clone(&self) -> Self {
        Self {
            str: self.str.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<TMarker: NameMarker> From<&str> for Name<TMarker> {
    fn from(val: &str) -> Self {
        Self::new(val)
    }
}

impl<TMarker: NameMarker> From<&String> for Name<TMarker> {
    fn from(val: &String) -> Self {
        Self::new(val.as_str())
    }
}

impl<TMarker: NameMarker> From<String> for Name<TMarker> {
    fn from(val: String) -> Self {
        Self {
            str: val.into(),
            _phantom: PhantomData,
        }
    }
}

impl<TMarker: NameMarker> AsRef<str> for Name<TMarker> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

macro_rules! impl_str_partial_eq {
    ($ty:ty, $other:ty) => {
        impl<'a, TMarker: NameMarker> PartialEq<$other> for $ty {
            fn eq(&self, other: &$other) -> bool {
                PartialEq::eq(AsRef::<str>::as_ref(self), AsRef::<str>::as_ref(other))
            }
        }
    };
}

impl_str_partial_eq!(Name<TMarker>, Name<TMarker>);
impl_str_partial_eq!(Name<TMarker>, str);
impl_str_partial_eq!(Name<TMarker>, &'a str);
impl_str_partial_eq!(Name<TMarker>, String);

impl<TMarker: NameMarker> Eq for Name<TMarker> {}

impl<TMarker: NameMarker> PartialOrd for Name<TMarker> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<TMarker: NameMarker> Ord for Name<TMarker> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl<TMarker: NameMarker> Hash for Name<TMarker> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl<TMarker: NameMarker> Debug for Name<TMarker> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple(TMarker::display_name())
            .field(&self.as_str())
            .finish()
    }
}

impl<TMarker: NameMarker> Display for Name<TMarker> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

// ==== Serialization/deserialization ===

struct ArcStrVisitor;

impl<'de> Visitor<'de> for ArcStrVisitor {
    type Value = Arc<str>;

    fn expecting(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.write_str("string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(v.into())
    }
}

impl<'de, TMarker: NameMarker> Deserialize<'de> for Name<TMarker> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(ArcStrVisitor).map(|v| Self {
            str: v,
            _phantom: PhantomData,
        })
    }
}

impl<TMarker: NameMarker> Serialize for Name<TMarker> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}
