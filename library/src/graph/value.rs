//! SlotValue — the typed runtime values flowing through output slots.

use serde::{Deserialize, Serialize};

use super::connection::SlotDataType;

/// Opaque descriptor for image data living on the GPU side.
///
/// The runtime only routes these between nodes; allocation, upload and
/// shader dispatch belong to the rendering subsystem.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    pub texture_id: u64,
    pub width: u32,
    pub height: u32,
}

impl ImageHandle {
    pub fn new(texture_id: u64, width: u32, height: u32) -> Self {
        Self {
            texture_id,
            width,
            height,
        }
    }
}

/// The value produced by evaluating a node's output slot.
///
/// Each variant corresponds to a `SlotDataType` and carries the concrete
/// runtime value for that type. `None` stands for an unconnected pull or a
/// slot that has not produced anything yet.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum SlotValue {
    /// Single floating-point number.
    Float(f64),
    /// Integer value.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// 2D vector.
    Vec2(f64, f64),
    /// 3D vector.
    Vec3(f64, f64, f64),
    /// RGBA color, linear, 0..1.
    Color([f32; 4]),
    /// Text string.
    Text(String),
    /// Image data (opaque GPU handle).
    Image(ImageHandle),
    /// List of values (aggregated fan-in, sample buffers, ...).
    List(Vec<SlotValue>),
    /// No value.
    None,
}

impl SlotValue {
    /// Extract as float, returning `default` if not numeric.
    pub fn as_float(&self, default: f64) -> f64 {
        match self {
            SlotValue::Float(v) => *v,
            SlotValue::Int(v) => *v as f64,
            _ => default,
        }
    }

    /// Extract as integer, returning `default` if not numeric. Floats are
    /// truncated toward zero.
    pub fn as_int(&self, default: i64) -> i64 {
        match self {
            SlotValue::Int(v) => *v,
            SlotValue::Float(v) => *v as i64,
            _ => default,
        }
    }

    /// Extract as boolean.
    pub fn as_bool(&self, default: bool) -> bool {
        match self {
            SlotValue::Bool(v) => *v,
            _ => default,
        }
    }

    /// Extract as Vec2.
    pub fn as_vec2(&self, default: (f64, f64)) -> (f64, f64) {
        match self {
            SlotValue::Vec2(x, y) => (*x, *y),
            _ => default,
        }
    }

    /// Extract as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SlotValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Extract as image handle.
    pub fn into_image(self) -> Option<ImageHandle> {
        match self {
            SlotValue::Image(img) => Some(img),
            _ => None,
        }
    }

    /// True for the `None` variant.
    pub fn is_none(&self) -> bool {
        matches!(self, SlotValue::None)
    }

    /// The data type of this value, or `None` for the empty value.
    pub fn data_type(&self) -> Option<SlotDataType> {
        match self {
            SlotValue::Float(_) => Some(SlotDataType::Float),
            SlotValue::Int(_) => Some(SlotDataType::Int),
            SlotValue::Bool(_) => Some(SlotDataType::Bool),
            SlotValue::Vec2(..) => Some(SlotDataType::Vec2),
            SlotValue::Vec3(..) => Some(SlotDataType::Vec3),
            SlotValue::Color(_) => Some(SlotDataType::Color),
            SlotValue::Text(_) => Some(SlotDataType::Text),
            SlotValue::Image(_) => Some(SlotDataType::Image),
            SlotValue::List(_) => Some(SlotDataType::List),
            SlotValue::None => None,
        }
    }

    /// Initial cache value for a freshly created slot of the given type.
    pub fn default_for(data_type: SlotDataType) -> SlotValue {
        match data_type {
            SlotDataType::Float => SlotValue::Float(0.0),
            SlotDataType::Int => SlotValue::Int(0),
            SlotDataType::Bool => SlotValue::Bool(false),
            SlotDataType::Vec2 => SlotValue::Vec2(0.0, 0.0),
            SlotDataType::Vec3 => SlotValue::Vec3(0.0, 0.0, 0.0),
            SlotDataType::Color => SlotValue::Color([0.0, 0.0, 0.0, 1.0]),
            SlotDataType::Text => SlotValue::Text(String::new()),
            SlotDataType::List => SlotValue::List(Vec::new()),
            // Images and wildcard slots start out empty.
            SlotDataType::Image | SlotDataType::Any => SlotValue::None,
        }
    }
}

impl From<f64> for SlotValue {
    fn from(value: f64) -> Self {
        SlotValue::Float(value)
    }
}

impl From<i64> for SlotValue {
    fn from(value: i64) -> Self {
        SlotValue::Int(value)
    }
}

impl From<bool> for SlotValue {
    fn from(value: bool) -> Self {
        SlotValue::Bool(value)
    }
}

impl From<String> for SlotValue {
    fn from(value: String) -> Self {
        SlotValue::Text(value)
    }
}

impl From<&str> for SlotValue {
    fn from(value: &str) -> Self {
        SlotValue::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_float_coerces_int() {
        assert_eq!(SlotValue::Int(3).as_float(0.0), 3.0);
        assert_eq!(SlotValue::Float(1.5).as_float(0.0), 1.5);
        assert_eq!(SlotValue::Text("x".into()).as_float(7.0), 7.0);
    }

    #[test]
    fn test_default_for_type() {
        assert_eq!(
            SlotValue::default_for(SlotDataType::Float),
            SlotValue::Float(0.0)
        );
        assert!(SlotValue::default_for(SlotDataType::Image).is_none());
    }

    #[test]
    fn test_data_type_roundtrip() {
        assert_eq!(SlotValue::Vec2(1.0, 2.0).data_type(), Some(SlotDataType::Vec2));
        assert_eq!(SlotValue::None.data_type(), None);
    }
}
