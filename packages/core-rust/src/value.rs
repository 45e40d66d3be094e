use std::cmp::Ordering;

use uuid::Uuid;

/// Runtime value kind as produced by a remote feature source.
///
/// The declared schema type of a field and the runtime kind of the value a
/// source hands back are independent: coercion (see [`crate::coerce`])
/// only surfaces a value when the two agree.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent value.
    Null,
    /// 16-bit signed integer.
    Short(i16),
    /// 32-bit signed integer.
    Integer(i32),
    /// 64-bit signed integer (object ids).
    Long(i64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// UTF-8 text.
    Text(String),
    /// Calendar value, stored as milliseconds since the Unix epoch.
    Date(i64),
    /// Identifier (GUID / global id fields).
    Guid(Uuid),
    /// Opaque binary payload (blob, raster, xml, geometry columns).
    Blob(Vec<u8>),
}

impl FieldValue {
    /// Text or numeric scalar. These are the only kinds aggregation output
    /// and feature-type ids keep.
    #[must_use]
    pub fn is_primitive_scalar(&self) -> bool {
        matches!(
            self,
            Self::Short(_)
                | Self::Integer(_)
                | Self::Long(_)
                | Self::Float(_)
                | Self::Double(_)
                | Self::Text(_)
        )
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value, if it is one of the numeric kinds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Short(v) => Some(f64::from(*v)),
            Self::Integer(v) => Some(f64::from(*v)),
            Self::Long(v) => Some(*v as f64),
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Wire form for scalar-only contexts: text and numeric kinds map to
    /// their natural wire value, everything else is `None`.
    #[must_use]
    pub fn to_scalar_wire(&self) -> Option<rmpv::Value> {
        match self {
            Self::Short(v) => Some(rmpv::Value::from(*v)),
            Self::Integer(v) => Some(rmpv::Value::from(*v)),
            Self::Long(v) => Some(rmpv::Value::from(*v)),
            Self::Float(v) => Some(rmpv::Value::F32(*v)),
            Self::Double(v) => Some(rmpv::Value::F64(*v)),
            Self::Text(s) => Some(rmpv::Value::from(s.as_str())),
            _ => None,
        }
    }

    /// Total-enough ordering used for sorting query results.
    ///
    /// Nulls sort first; numbers compare numerically across kinds; text
    /// compares lexically; dates compare chronologically. Values of
    /// unrelated kinds compare as equal.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Guid(a), Self::Guid(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            },
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}
