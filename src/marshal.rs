//! Moving values between [`Value`] and the engine's [`RawValue`] layout.

use std::mem::ManuallyDrop;

use crate::{
    error::{Error, Result},
    ffi::engine::{RawValue, RawValueList, RawValueTag},
    multivalue::MultiValue,
    value::{ErrorVariant, LightUserData, Lua, Value},
};

impl Lua {
    /// Converts `value` for the engine.
    ///
    /// Objects are handed over as a fresh owned reference, so `value` stays usable.
    pub(crate) fn value_to_raw(&self, value: &Value) -> Result<RawValue> {
        if let Some(owner) = value.lua() {
            if !owner.same_vm(self) {
                return Err(Error::ForeignVm(value.type_of().name()));
            }
        }

        Ok(match value {
            Value::Nil => RawValue::nil(),
            Value::Boolean(b) => RawValue::boolean(*b),
            Value::LightUserData(LightUserData(ptr)) => {
                RawValue::pointer(RawValueTag::LightUserData, *ptr)
            }
            Value::Integer(i) => RawValue::integer(*i),
            Value::Number(n) => RawValue::number(*n),
            Value::Vector(v) => RawValue::vector(*v),
            Value::String(v) => v.to_raw()?,
            Value::Table(v) => v.to_raw()?,
            Value::Function(v) => v.to_raw()?,
            Value::Thread(v) => v.to_raw()?,
            Value::UserData(v) => v.to_raw()?,
            Value::Buffer(v) => v.to_raw()?,
            Value::Error(e) => RawValue::error(e.bytes().ok_or(Error::ClosedObject)?),
            Value::Other => RawValue::other(),
        })
    }

    /// Takes ownership of a value coming from the engine.
    ///
    /// # Safety
    /// Object pointers in `raw` must be owned references of this VM, error bytes must
    /// come from [`RawBytes::from_vec`](crate::ffi::string::RawBytes::from_vec).
    pub(crate) unsafe fn value_from_raw(&self, raw: RawValue) -> Value {
        let data = raw.data;

        match raw.tag {
            RawValueTag::Nil => Value::Nil,
            RawValueTag::Boolean => Value::Boolean(data.boolean),
            RawValueTag::LightUserData => Value::LightUserData(LightUserData(data.pointer)),
            RawValueTag::Integer => Value::Integer(data.integer),
            RawValueTag::Number => Value::Number(data.number),
            RawValueTag::Vector => Value::Vector(data.vector),
            RawValueTag::String => self.wrap_string(data.pointer).map_or(Value::Nil, Value::String),
            RawValueTag::Table => self.wrap_table(data.pointer).map_or(Value::Nil, Value::Table),
            RawValueTag::Function => {
                self.wrap_function(data.pointer).map_or(Value::Nil, Value::Function)
            }
            RawValueTag::Thread => self.wrap_thread(data.pointer).map_or(Value::Nil, Value::Thread),
            RawValueTag::UserData => {
                self.wrap_userdata(data.pointer).map_or(Value::Nil, Value::UserData)
            }
            RawValueTag::Buffer => self.wrap_buffer(data.pointer).map_or(Value::Nil, Value::Buffer),
            RawValueTag::Error => {
                let bytes = ManuallyDrop::into_inner(data.bytes).into_vec();
                Value::Error(ErrorVariant::new(bytes.unwrap_or_default()))
            }
            RawValueTag::Other => Value::Other,
        }
    }

    /// Releases a converted value that never reached the engine.
    ///
    /// # Safety
    /// Same contract as [`Lua::value_from_raw`].
    pub(crate) unsafe fn release_raw(&self, raw: RawValue) {
        let _ = self.value_from_raw(raw).close();
    }

    /// Converts every value, releasing the converted ones if any conversion fails.
    pub(crate) fn list_from_values(&self, values: &MultiValue) -> Result<RawValueList> {
        let mut list = RawValueList::with_capacity(values.len());

        for value in values.iter() {
            match self.value_to_raw(value) {
                Ok(raw) => list.push(raw),
                Err(err) => {
                    while let Some(raw) = list.pop() {
                        unsafe { self.release_raw(raw) };
                    }
                    return Err(err);
                }
            }
        }

        Ok(list)
    }

    /// Takes ownership of every value in `list`.
    ///
    /// # Safety
    /// Same contract as [`Lua::value_from_raw`] for each element.
    pub(crate) unsafe fn values_from_list(&self, mut list: RawValueList) -> MultiValue {
        let mut values = MultiValue::with_capacity(list.len());

        while let Some(raw) = list.pop() {
            values.push_back(self.value_from_raw(raw));
        }

        values
    }
}
