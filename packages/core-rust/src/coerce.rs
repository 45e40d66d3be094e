//! Declared-type driven attribute coercion.
//!
//! | declared type                          | accepted raw kind | wire value            |
//! |----------------------------------------|-------------------|-----------------------|
//! | SHORT                                  | `Short`           | integer               |
//! | INTEGER                                | `Integer`         | integer               |
//! | OID                                    | `Long`            | integer (64-bit)      |
//! | FLOAT                                  | `Float`           | f32                   |
//! | DOUBLE                                 | `Double`          | f64                   |
//! | DATE                                   | `Date`            | integer epoch millis  |
//! | TEXT                                   | `Text`            | string                |
//! | GUID, GLOBALID                         | `Guid`            | hyphenated string     |
//! | UNKNOWN, GEOMETRY, RASTER, XML, BLOB   | any               | nil                   |
//!
//! A raw value of any other kind degrades to nil instead of failing.

use rmpv::Value;

use crate::schema::FieldType;
use crate::value::FieldValue;

/// Coerce `raw` according to the declared type of its field.
///
/// `declared` is `None` when the attribute has no matching schema field;
/// such attributes coerce to nil.
#[must_use]
pub fn coerce(declared: Option<FieldType>, raw: &FieldValue) -> Value {
    let Some(declared) = declared else {
        return Value::Nil;
    };
    match (declared, raw) {
        (FieldType::Short, FieldValue::Short(v)) => Value::from(*v),
        (FieldType::Integer, FieldValue::Integer(v)) => Value::from(*v),
        (FieldType::Oid, FieldValue::Long(v)) => Value::from(*v),
        (FieldType::Float, FieldValue::Float(v)) => Value::F32(*v),
        (FieldType::Double, FieldValue::Double(v)) => Value::F64(*v),
        (FieldType::Date, FieldValue::Date(millis)) => Value::from(*millis),
        (FieldType::Text, FieldValue::Text(s)) => Value::from(s.as_str()),
        (FieldType::Guid | FieldType::GlobalId, FieldValue::Guid(id)) => {
            Value::from(id.hyphenated().to_string())
        }
        _ => Value::Nil,
    }
}
