//! Runtime type descriptors for callable parameters and outputs.
//!
//! A [`TypeDesc`] stands in for reflection: it carries the [`TypeId`] that
//! resolver lookup is keyed on, a printable type name for diagnostics, and the
//! optional scanner the fallback converter uses to parse a token.

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    ops::Deref,
    path::PathBuf,
    str::FromStr,
};

use crate::error::BoxError;

/// A type-erased argument or output value.
pub type Value = Box<dyn Any + Send + Sync>;

/// Parses one scanned field into a type-erased value.
pub type Scanner = fn(&str) -> Result<Value, BoxError>;

/// Implements [`Param`] with a [`FromStr`]-backed scanner for each listed type.
///
/// ```ignore
/// #[derive(Debug)]
/// struct Port(u16);
///
/// impl std::str::FromStr for Port { /* ... */ }
///
/// argbind_core::scan_param!(Port);
/// ```
#[macro_export]
macro_rules! scan_param {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Param for $ty {
                fn scanner() -> ::core::option::Option<$crate::Scanner> {
                    ::core::option::Option::Some($crate::scan_from_str::<$ty>)
                }
            }
        )+
    };
}

/// A type that can cross the type-erased argument boundary.
///
/// Every parameter and output type of a bound callable implements `Param`.
/// Types with a [`scanner`](Param::scanner) can be produced from a token by
/// the fallback converter; types without one can only be produced by a
/// custom or context resolver.
pub trait Param: Send + Sync + 'static {
    /// Returns the scanner used to parse a token into this type.
    fn scanner() -> Option<Scanner> {
        None
    }
}

/// Scanner for any [`FromStr`] type.
///
/// # Errors
///
/// Returns the type's parse error, boxed.
pub fn scan_from_str<T>(field: &str) -> Result<Value, BoxError>
where
    T: Param + FromStr,
    T::Err: Into<BoxError>,
{
    field
        .parse::<T>()
        .map(|value| Box::new(value) as Value)
        .map_err(Into::into)
}

scan_param!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char,
    String, PathBuf, IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, serde_json::Value,
);

impl<T: Param> Param for Vec<T> {}

impl<T: Param> Param for Option<T> {}

/// Runtime descriptor of a parameter or variadic element type.
#[derive(Clone, Copy)]
pub struct TypeDesc {
    id: TypeId,
    name: &'static str,
    scanner: Option<Scanner>,
}

impl TypeDesc {
    /// Describes `T`.
    #[must_use]
    pub fn of<T: Param>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            scanner: T::scanner(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, for diagnostics only.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn scanner(&self) -> Option<Scanner> {
        self.scanner
    }

    /// Returns true if this descriptor is exactly `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDesc {}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDesc")
            .field("name", &self.name)
            .field("scannable", &self.scanner.is_some())
            .finish()
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Variadic tail of a callable.
///
/// A callable whose last parameter is `Rest<T>` receives one `T` per token
/// left after its fixed parameters are bound.
///
/// ```ignore
/// fn add(nums: Rest<i64>) -> i64 {
///     nums.iter().sum()
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rest<T>(pub Vec<T>);

impl<T> Rest<T> {
    #[must_use]
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Rest<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> IntoIterator for Rest<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
